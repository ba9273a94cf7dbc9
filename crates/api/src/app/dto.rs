use serde::{Deserialize, Serialize};

use lexdesk_auth::{EffectivePermissions, MenuNode};
use lexdesk_core::{MenuItemId, RoleId, UserId};
use lexdesk_history::Order;

use crate::context::CurrentUser;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct MenuQuery {
    pub role_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PermissionCheckQuery {
    pub permission: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TimelineQuery {
    #[serde(default)]
    pub order: Order,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignMediatorRequest {
    pub mediator_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SyncPermissionsRequest {
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct MenuVisibility {
    pub menu_item_id: MenuItemId,
    pub visible: bool,
}

#[derive(Debug, Deserialize)]
pub struct SyncMenusRequest {
    pub items: Vec<MenuVisibility>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub roles: Vec<String>,
    pub permissions: EffectivePermissions,
}

impl From<&CurrentUser> for WhoAmIResponse {
    fn from(current: &CurrentUser) -> Self {
        Self {
            id: current.user.id,
            name: current.user.name.clone(),
            email: current.user.email.clone(),
            roles: current.roles.iter().map(|r| r.key.as_str().to_string()).collect(),
            permissions: current.permissions.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MenuResponse {
    pub role_id: Option<RoleId>,
    pub items: Vec<MenuNode>,
}

#[derive(Debug, Serialize)]
pub struct PermissionCheckResponse {
    pub permission: String,
    pub granted: bool,
}
