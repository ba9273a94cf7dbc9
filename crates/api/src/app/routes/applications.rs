//! Arbitration application routes.
//!
//! Every route is audited as `arbitration_application`. Reads need
//! `APPLICATION_VIEW`, changes `APPLICATION_EDIT`, removal `APPLICATION_DELETE`.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
};

use lexdesk_arbitration::{ApplicationPatch, NewApplication};
use lexdesk_auth::permissions::keys;
use lexdesk_core::{EntityId, UserId};

use crate::app::dto::{AssignMediatorRequest, ChangeStatusRequest, TimelineQuery};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::audit::audited;
use crate::authz::{PermissionGate, guard};
use crate::context::CurrentUser;

pub const ENTITY_TYPE: &str = "arbitration_application";

pub fn router(services: &AppServices) -> Router {
    let store = &services.audit;

    let read = Router::new()
        .route("/", get(list_applications))
        .route("/:id", get(get_application))
        .route("/:id/timeline", get(application_timeline));
    let write = Router::new()
        .route("/", post(create_application))
        .route("/:id", patch(update_application));
    let status = Router::new().route("/:id/status", post(change_status));
    let mediator = Router::new().route("/:id/mediator", put(assign_mediator));
    let remove = Router::new().route("/:id", delete(delete_application));

    let view = || [PermissionGate::new(keys::APPLICATION_VIEW)];
    let edit = || [PermissionGate::new(keys::APPLICATION_EDIT)];

    let config = || services.audit_config(ENTITY_TYPE);

    guard(audited(read, store.clone(), config()), view())
        .merge(guard(audited(write, store.clone(), config()), edit()))
        .merge(guard(
            audited(status, store.clone(), config().with_action("status_change")),
            edit(),
        ))
        .merge(guard(
            audited(mediator, store.clone(), config().with_action("assign_mediator")),
            edit(),
        ))
        .merge(guard(
            audited(remove, store.clone(), config()),
            [PermissionGate::new(keys::APPLICATION_DELETE)],
        ))
}

fn parse_entity(raw: &str) -> Result<EntityId, Response> {
    errors::parse_id(raw)
}

/// GET /applications
pub async fn list_applications(Extension(services): Extension<Arc<AppServices>>) -> Response {
    Json(services.applications.list().await).into_response()
}

/// POST /applications
pub async fn create_application(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<NewApplication>,
) -> Response {
    match services.applications.create(body, Some(current.id())).await {
        Ok(app) => (StatusCode::CREATED, Json(app)).into_response(),
        Err(e) => errors::application_error_to_response(e),
    }
}

/// GET /applications/:id
pub async fn get_application(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_entity(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.applications.get(id).await {
        Some(app) => Json(app).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "application not found"),
    }
}

/// PATCH /applications/:id
pub async fn update_application(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(body): Json<ApplicationPatch>,
) -> Response {
    let id = match parse_entity(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.applications.update(id, body, Some(current.id())).await {
        Ok(app) => Json(app).into_response(),
        Err(e) => errors::application_error_to_response(e),
    }
}

/// POST /applications/:id/status
pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(body): Json<ChangeStatusRequest>,
) -> Response {
    let id = match parse_entity(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services
        .applications
        .change_status(id, &body.status, body.note, Some(current.id()))
        .await
    {
        Ok(app) => Json(app).into_response(),
        Err(e) => errors::application_error_to_response(e),
    }
}

/// PUT /applications/:id/mediator
pub async fn assign_mediator(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(body): Json<AssignMediatorRequest>,
) -> Response {
    let id = match parse_entity(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let mediator: UserId = match errors::parse_id(&body.mediator_id) {
        Ok(m) => m,
        Err(resp) => return resp,
    };

    match services.identity.user(mediator).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", "unknown mediator");
        }
        Err(e) => return errors::identity_error_to_response(e),
    }

    match services
        .applications
        .assign_mediator(id, mediator, Some(current.id()))
        .await
    {
        Ok(app) => Json(app).into_response(),
        Err(e) => errors::application_error_to_response(e),
    }
}

/// DELETE /applications/:id
pub async fn delete_application(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_entity(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.applications.delete(id, Some(current.id())).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::application_error_to_response(e),
    }
}

/// GET /applications/:id/timeline?order=newest_first|oldest_first
pub async fn application_timeline(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<TimelineQuery>,
) -> Response {
    let id = match parse_entity(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.applications.timeline(id, query.order).await {
        Ok(events) => Json(events).into_response(),
        Err(e) => errors::application_error_to_response(e),
    }
}
