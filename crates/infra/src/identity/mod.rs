//! Identity store: users, roles, permissions, their associations and the
//! menu tables.
//!
//! Every lookup that feeds an authorization or menu decision skips
//! tombstoned rows.

mod error;
mod in_memory;

pub use error::IdentityError;
pub use in_memory::InMemoryIdentityStore;

use lexdesk_auth::{
    EffectivePermissions, MenuItem, MenuNode, Permission, PermissionRecord, RoleRecord, User,
};
use lexdesk_core::{MenuItemId, PermissionId, RoleId, UserId};

#[async_trait::async_trait]
pub trait IdentityStore: Send + Sync {
    /// A live user.
    async fn user(&self, id: UserId) -> Result<Option<User>, IdentityError>;

    /// A live user by (normalized) email.
    async fn user_by_email(&self, email: &str) -> Result<Option<User>, IdentityError>;

    async fn role(&self, id: RoleId) -> Result<Option<RoleRecord>, IdentityError>;

    async fn role_by_key(&self, key: &str) -> Result<Option<RoleRecord>, IdentityError>;

    async fn permission_by_key(&self, key: &str) -> Result<Option<PermissionRecord>, IdentityError>;

    /// Live roles held by the user, in assignment order.
    async fn roles_for_user(&self, user_id: UserId) -> Result<Vec<RoleRecord>, IdentityError>;

    /// Live permission keys granted to a role.
    async fn role_permissions(&self, role_id: RoleId) -> Result<Vec<Permission>, IdentityError>;

    /// Union of the live permissions of the user's live roles.
    ///
    /// A deleted or unknown user has no permissions.
    async fn effective_permissions(&self, user_id: UserId) -> Result<EffectivePermissions, IdentityError>;

    /// Visible menu tree for a role. A deleted role sees nothing.
    async fn menu_for_role(&self, role_id: RoleId) -> Result<Vec<MenuNode>, IdentityError>;

    async fn create_user(&self, user: User) -> Result<User, IdentityError>;

    async fn create_role(&self, role: RoleRecord) -> Result<RoleRecord, IdentityError>;

    async fn create_permission(&self, permission: PermissionRecord) -> Result<PermissionRecord, IdentityError>;

    /// Returns `false` when the user already held the role.
    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<bool, IdentityError>;

    /// Returns `false` when the user did not hold the role.
    async fn revoke_role(&self, user_id: UserId, role_id: RoleId) -> Result<bool, IdentityError>;

    /// Replace the role's permission set. All or nothing: an unknown or
    /// deleted key leaves the role untouched.
    async fn sync_role_permissions(&self, role_id: RoleId, keys: &[Permission]) -> Result<(), IdentityError>;

    /// Replace the role's menu visibility rows. All or nothing.
    async fn sync_role_menus(
        &self,
        role_id: RoleId,
        visibility: &[(MenuItemId, bool)],
    ) -> Result<(), IdentityError>;

    async fn menu_items(&self) -> Result<Vec<MenuItem>, IdentityError>;

    /// Insert or replace a menu item. Rejects duplicate paths, unknown
    /// parents and parent cycles.
    async fn upsert_menu_item(&self, item: MenuItem) -> Result<MenuItem, IdentityError>;

    /// Delete an item and all its descendants; returns how many were removed.
    async fn delete_menu_item(&self, id: MenuItemId) -> Result<usize, IdentityError>;

    async fn soft_delete_user(&self, id: UserId) -> Result<(), IdentityError>;

    async fn soft_delete_role(&self, id: RoleId) -> Result<(), IdentityError>;

    async fn soft_delete_permission(&self, id: PermissionId) -> Result<(), IdentityError>;
}
