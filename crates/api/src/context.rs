use axum::extract::{OriginalUri, Request};

use lexdesk_auth::{EffectivePermissions, Permission, RoleRecord, User, has_permission};
use lexdesk_core::UserId;

/// The authenticated user for one request.
///
/// Inserted into the request extensions by the authentication gate and only
/// read afterwards. Handlers receive it as `Extension<CurrentUser>`.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    /// Live roles in assignment order.
    pub roles: Vec<RoleRecord>,
    pub permissions: EffectivePermissions,
}

impl CurrentUser {
    pub fn id(&self) -> UserId {
        self.user.id
    }

    /// Ad-hoc permission check for handlers.
    pub fn can(&self, required: &Permission) -> bool {
        has_permission(&self.permissions, required)
    }
}

/// Full request path, including any prefix stripped by nested routers.
pub fn request_path(req: &Request) -> String {
    req.extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string())
}
