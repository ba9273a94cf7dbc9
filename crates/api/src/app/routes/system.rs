use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, OriginalUri, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use lexdesk_auth::Permission;
use lexdesk_core::RoleId;

use crate::app::dto::{MenuQuery, MenuResponse, PermissionCheckQuery, PermissionCheckResponse, WhoAmIResponse};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::CurrentUser;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(current): Extension<CurrentUser>) -> impl IntoResponse {
    Json(WhoAmIResponse::from(&current))
}

/// GET /menu - the visible menu tree for one of the caller's roles.
///
/// `?role_id=` picks a specific role the caller holds; otherwise the first
/// role in assignment order is used.
pub async fn menu(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<MenuQuery>,
) -> Response {
    let role_id = match query.role_id.as_deref() {
        Some(raw) => {
            let requested: RoleId = match errors::parse_id(raw) {
                Ok(id) => id,
                Err(resp) => return resp,
            };
            if !current.roles.iter().any(|r| r.id == requested) {
                tracing::warn!(user_id = %current.id(), role_id = %requested, "menu requested for a role the user does not hold");
                return errors::gate_error(StatusCode::FORBIDDEN, "Forbidden", uri.path());
            }
            Some(requested)
        }
        None => current.roles.first().map(|r| r.id),
    };

    let items = match role_id {
        Some(role_id) => match services.identity.menu_for_role(role_id).await {
            Ok(items) => items,
            Err(e) => return errors::identity_error_to_response(e),
        },
        None => Vec::new(),
    };

    Json(MenuResponse { role_id, items }).into_response()
}

/// GET /permissions/check?permission=KEY
pub async fn check_permission(
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<PermissionCheckQuery>,
) -> impl IntoResponse {
    let granted = current.can(&Permission::new(query.permission.clone()));
    Json(PermissionCheckResponse {
        permission: query.permission,
        granted,
    })
}
