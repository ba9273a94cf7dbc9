//! Administrative grant/revoke endpoints and the audit log listing.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde_json::json;

use lexdesk_auth::{Permission, permissions::keys};
use lexdesk_core::{RoleId, UserId};
use lexdesk_history::AuditFilter;

use crate::app::dto::{SyncMenusRequest, SyncPermissionsRequest};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::audit::audited;
use crate::authz::{PermissionGate, guard};

const DEFAULT_AUDIT_LIMIT: usize = 100;

pub const AUDIT_LOG_ENTITY: &str = "audit_log";

pub fn router(services: &AppServices) -> Router {
    let roles = Router::new()
        .route("/roles/:id/permissions", put(sync_role_permissions))
        .route("/roles/:id/menus", put(sync_role_menus));
    let users = Router::new().route(
        "/users/:id/roles/:role_id",
        post(assign_role).delete(revoke_role),
    );
    let audit_log = Router::new().route("/audit", get(list_audit));

    let manage = || [PermissionGate::new(keys::ROLE_MANAGE)];

    let store = &services.audit;

    guard(audited(roles, store.clone(), services.audit_config("role")), manage())
        .merge(guard(audited(users, store.clone(), services.audit_config("user")), manage()))
        .merge(guard(
            audited(audit_log, store.clone(), services.audit_config(AUDIT_LOG_ENTITY).with_action("list")),
            [PermissionGate::new(keys::AUDIT_VIEW)],
        ))
}

/// PUT /admin/roles/:id/permissions - replace a role's permission set.
pub async fn sync_role_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<SyncPermissionsRequest>,
) -> Response {
    let role_id: RoleId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let grants: Vec<Permission> = body.permissions.into_iter().map(Permission::new).collect();

    if let Err(e) = services.identity.sync_role_permissions(role_id, &grants).await {
        return errors::identity_error_to_response(e);
    }
    match services.identity.role_permissions(role_id).await {
        Ok(granted) => Json(json!({
            "role_id": role_id,
            "permissions": granted.iter().map(Permission::as_str).collect::<Vec<_>>(),
        }))
        .into_response(),
        Err(e) => errors::identity_error_to_response(e),
    }
}

/// PUT /admin/roles/:id/menus - replace a role's menu visibility rows.
pub async fn sync_role_menus(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<SyncMenusRequest>,
) -> Response {
    let role_id: RoleId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let rows: Vec<_> = body.items.iter().map(|i| (i.menu_item_id, i.visible)).collect();

    if let Err(e) = services.identity.sync_role_menus(role_id, &rows).await {
        return errors::identity_error_to_response(e);
    }
    match services.identity.menu_for_role(role_id).await {
        Ok(items) => Json(json!({ "role_id": role_id, "items": items })).into_response(),
        Err(e) => errors::identity_error_to_response(e),
    }
}

fn parse_assignment(user_id: &str, role_id: &str) -> Result<(UserId, RoleId), Response> {
    Ok((errors::parse_id(user_id)?, errors::parse_id(role_id)?))
}

/// POST /admin/users/:id/roles/:role_id
pub async fn assign_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path((user_id, role_id)): Path<(String, String)>,
) -> Response {
    let (user_id, role_id) = match parse_assignment(&user_id, &role_id) {
        Ok(ids) => ids,
        Err(resp) => return resp,
    };
    match services.identity.assign_role(user_id, role_id).await {
        Ok(true) => StatusCode::CREATED.into_response(),
        Ok(false) => StatusCode::OK.into_response(),
        Err(e) => errors::identity_error_to_response(e),
    }
}

/// DELETE /admin/users/:id/roles/:role_id
pub async fn revoke_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path((user_id, role_id)): Path<(String, String)>,
) -> Response {
    let (user_id, role_id) = match parse_assignment(&user_id, &role_id) {
        Ok(ids) => ids,
        Err(resp) => return resp,
    };
    match services.identity.revoke_role(user_id, role_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "role not assigned"),
        Err(e) => errors::identity_error_to_response(e),
    }
}

/// GET /admin/audit - newest first, filtered by query parameters.
pub async fn list_audit(
    Extension(services): Extension<Arc<AppServices>>,
    Query(mut filter): Query<AuditFilter>,
) -> Response {
    filter.limit.get_or_insert(DEFAULT_AUDIT_LIMIT);
    match services.audit.list(&filter).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => errors::history_error_to_response(e),
    }
}
