//! In-memory identity store.
//!
//! All tables live behind one lock, so every multi-row change (bulk syncs,
//! cascading menu deletes) is applied atomically.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use lexdesk_auth::{
    EffectivePermissions, MenuAccess, MenuItem, MenuNode, MenuPermission, Permission, PermissionRecord,
    RolePermission, RoleRecord, User, UserRole, creates_cycle, descendants, identity::normalize_email, menu_for,
};
use lexdesk_core::{MenuItemId, PermissionId, RoleId, Tombstone, UserId};

use super::{IdentityError, IdentityStore};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    roles: HashMap<RoleId, RoleRecord>,
    permissions: HashMap<PermissionId, PermissionRecord>,
    // Vec keeps assignment order.
    user_roles: Vec<UserRole>,
    role_permissions: Vec<RolePermission>,
    menu_items: Vec<MenuItem>,
    menu_permissions: Vec<MenuPermission>,
}

impl Tables {
    fn live_user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id).filter(|u| u.is_live())
    }

    fn live_role(&self, id: RoleId) -> Option<&RoleRecord> {
        self.roles.get(&id).filter(|r| r.is_live())
    }

    fn live_roles_of(&self, user_id: UserId) -> Vec<&RoleRecord> {
        self.user_roles
            .iter()
            .filter(|ur| ur.user_id == user_id)
            .filter_map(|ur| self.live_role(ur.role_id))
            .collect()
    }

    fn live_permissions_of(&self, role_id: RoleId) -> Vec<Permission> {
        self.role_permissions
            .iter()
            .filter(|rp| rp.role_id == role_id)
            .filter_map(|rp| self.permissions.get(&rp.permission_id))
            .filter(|p| p.is_live())
            .map(|p| p.key.clone())
            .collect()
    }

    fn live_permission_by_key(&self, key: &str) -> Option<&PermissionRecord> {
        self.permissions
            .values()
            .find(|p| p.is_live() && p.key.as_str() == key)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    tables: RwLock<Tables>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, IdentityError> {
        self.tables
            .read()
            .map_err(|_| IdentityError::Persistence("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, IdentityError> {
        self.tables
            .write()
            .map_err(|_| IdentityError::Persistence("lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn user(&self, id: UserId) -> Result<Option<User>, IdentityError> {
        Ok(self.read()?.live_user(id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, IdentityError> {
        let Ok(email) = normalize_email(email) else {
            return Ok(None);
        };
        let tables = self.read()?;
        Ok(tables
            .users
            .values()
            .find(|u| u.is_live() && u.email == email)
            .cloned())
    }

    async fn role(&self, id: RoleId) -> Result<Option<RoleRecord>, IdentityError> {
        Ok(self.read()?.live_role(id).cloned())
    }

    async fn role_by_key(&self, key: &str) -> Result<Option<RoleRecord>, IdentityError> {
        let tables = self.read()?;
        Ok(tables
            .roles
            .values()
            .find(|r| r.is_live() && r.key.as_str() == key)
            .cloned())
    }

    async fn permission_by_key(&self, key: &str) -> Result<Option<PermissionRecord>, IdentityError> {
        Ok(self.read()?.live_permission_by_key(key).cloned())
    }

    async fn roles_for_user(&self, user_id: UserId) -> Result<Vec<RoleRecord>, IdentityError> {
        let tables = self.read()?;
        if tables.live_user(user_id).is_none() {
            return Ok(Vec::new());
        }
        Ok(tables.live_roles_of(user_id).into_iter().cloned().collect())
    }

    async fn role_permissions(&self, role_id: RoleId) -> Result<Vec<Permission>, IdentityError> {
        let tables = self.read()?;
        if tables.live_role(role_id).is_none() {
            return Ok(Vec::new());
        }
        Ok(tables.live_permissions_of(role_id))
    }

    async fn effective_permissions(&self, user_id: UserId) -> Result<EffectivePermissions, IdentityError> {
        let tables = self.read()?;
        if tables.live_user(user_id).is_none() {
            return Ok(EffectivePermissions::none());
        }

        let grants = tables
            .live_roles_of(user_id)
            .into_iter()
            .flat_map(|role| tables.live_permissions_of(role.id));
        Ok(EffectivePermissions::from_grants(grants))
    }

    async fn menu_for_role(&self, role_id: RoleId) -> Result<Vec<MenuNode>, IdentityError> {
        let tables = self.read()?;
        if tables.live_role(role_id).is_none() {
            return Ok(Vec::new());
        }

        let access = if tables.live_permissions_of(role_id).iter().any(Permission::is_wildcard) {
            MenuAccess::All
        } else {
            MenuAccess::Role(role_id)
        };
        Ok(menu_for(&tables.menu_items, &tables.menu_permissions, access))
    }

    async fn create_user(&self, user: User) -> Result<User, IdentityError> {
        let mut tables = self.write()?;
        if tables.users.contains_key(&user.id) {
            return Err(IdentityError::Conflict(format!("user {} already exists", user.id)));
        }
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(IdentityError::Conflict(format!("email {} already registered", user.email)));
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn create_role(&self, role: RoleRecord) -> Result<RoleRecord, IdentityError> {
        let mut tables = self.write()?;
        if tables.roles.contains_key(&role.id) || tables.roles.values().any(|r| r.key == role.key) {
            return Err(IdentityError::Conflict(format!("role {} already exists", role.key)));
        }
        tables.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn create_permission(&self, permission: PermissionRecord) -> Result<PermissionRecord, IdentityError> {
        let mut tables = self.write()?;
        if tables.permissions.contains_key(&permission.id)
            || tables.permissions.values().any(|p| p.key == permission.key)
        {
            return Err(IdentityError::Conflict(format!(
                "permission {} already exists",
                permission.key
            )));
        }
        tables.permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }

    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<bool, IdentityError> {
        let mut tables = self.write()?;
        if tables.live_user(user_id).is_none() {
            return Err(IdentityError::NotFound("user"));
        }
        if tables.live_role(role_id).is_none() {
            return Err(IdentityError::NotFound("role"));
        }

        let link = UserRole { user_id, role_id };
        if tables.user_roles.contains(&link) {
            return Ok(false);
        }
        tables.user_roles.push(link);
        Ok(true)
    }

    async fn revoke_role(&self, user_id: UserId, role_id: RoleId) -> Result<bool, IdentityError> {
        let mut tables = self.write()?;
        let before = tables.user_roles.len();
        tables
            .user_roles
            .retain(|ur| !(ur.user_id == user_id && ur.role_id == role_id));
        Ok(tables.user_roles.len() != before)
    }

    async fn sync_role_permissions(&self, role_id: RoleId, keys: &[Permission]) -> Result<(), IdentityError> {
        let mut tables = self.write()?;
        if tables.live_role(role_id).is_none() {
            return Err(IdentityError::NotFound("role"));
        }

        // Resolve everything before touching the association table.
        let mut resolved = Vec::with_capacity(keys.len());
        for key in keys {
            let permission = tables
                .live_permission_by_key(key.as_str())
                .ok_or_else(|| IdentityError::Validation(format!("unknown permission: {key}")))?;
            if !resolved.contains(&permission.id) {
                resolved.push(permission.id);
            }
        }

        tables.role_permissions.retain(|rp| rp.role_id != role_id);
        tables
            .role_permissions
            .extend(resolved.into_iter().map(|permission_id| RolePermission { role_id, permission_id }));

        tracing::info!(%role_id, count = keys.len(), "role permissions synced");
        Ok(())
    }

    async fn sync_role_menus(
        &self,
        role_id: RoleId,
        visibility: &[(MenuItemId, bool)],
    ) -> Result<(), IdentityError> {
        let mut tables = self.write()?;
        if tables.live_role(role_id).is_none() {
            return Err(IdentityError::NotFound("role"));
        }

        let known: HashSet<MenuItemId> = tables.menu_items.iter().map(|i| i.id).collect();
        let mut rows: HashMap<MenuItemId, bool> = HashMap::new();
        for (item_id, visible) in visibility {
            if !known.contains(item_id) {
                return Err(IdentityError::Validation(format!("unknown menu item: {item_id}")));
            }
            rows.insert(*item_id, *visible);
        }

        tables.menu_permissions.retain(|mp| mp.role_id != role_id);
        tables
            .menu_permissions
            .extend(rows.into_iter().map(|(menu_item_id, visible)| MenuPermission {
                role_id,
                menu_item_id,
                visible,
            }));

        tracing::info!(%role_id, count = visibility.len(), "role menus synced");
        Ok(())
    }

    async fn menu_items(&self) -> Result<Vec<MenuItem>, IdentityError> {
        Ok(self.read()?.menu_items.clone())
    }

    async fn upsert_menu_item(&self, item: MenuItem) -> Result<MenuItem, IdentityError> {
        let mut tables = self.write()?;

        if tables
            .menu_items
            .iter()
            .any(|existing| existing.path == item.path && existing.id != item.id)
        {
            return Err(IdentityError::Conflict(format!("menu path {} already exists", item.path)));
        }
        if let Some(parent) = item.parent_id {
            if !tables.menu_items.iter().any(|i| i.id == parent) {
                return Err(IdentityError::NotFound("parent menu item"));
            }
        }
        if creates_cycle(&tables.menu_items, item.id, item.parent_id) {
            return Err(IdentityError::MenuCycle);
        }

        match tables.menu_items.iter_mut().find(|i| i.id == item.id) {
            Some(existing) => *existing = item.clone(),
            None => tables.menu_items.push(item.clone()),
        }
        Ok(item)
    }

    async fn delete_menu_item(&self, id: MenuItemId) -> Result<usize, IdentityError> {
        let mut tables = self.write()?;
        if !tables.menu_items.iter().any(|i| i.id == id) {
            return Err(IdentityError::NotFound("menu item"));
        }

        let mut doomed: HashSet<MenuItemId> = descendants(&tables.menu_items, id).into_iter().collect();
        doomed.insert(id);

        tables.menu_items.retain(|i| !doomed.contains(&i.id));
        tables.menu_permissions.retain(|mp| !doomed.contains(&mp.menu_item_id));
        Ok(doomed.len())
    }

    async fn soft_delete_user(&self, id: UserId) -> Result<(), IdentityError> {
        let mut tables = self.write()?;
        let user = tables
            .users
            .get_mut(&id)
            .filter(|u| u.is_live())
            .ok_or(IdentityError::NotFound("user"))?;
        user.tombstone = Tombstone::deleted_now();
        user.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn soft_delete_role(&self, id: RoleId) -> Result<(), IdentityError> {
        let mut tables = self.write()?;
        let role = tables
            .roles
            .get_mut(&id)
            .filter(|r| r.is_live())
            .ok_or(IdentityError::NotFound("role"))?;
        role.tombstone = Tombstone::deleted_now();
        Ok(())
    }

    async fn soft_delete_permission(&self, id: PermissionId) -> Result<(), IdentityError> {
        let mut tables = self.write()?;
        let permission = tables
            .permissions
            .get_mut(&id)
            .filter(|p| p.is_live())
            .ok_or(IdentityError::NotFound("permission"))?;
        permission.tombstone = Tombstone::deleted_now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lexdesk_auth::{RoleKey, has_permission, permissions::keys};

    struct Fixture {
        store: InMemoryIdentityStore,
        user: UserId,
        lawyer: RoleId,
    }

    async fn permission(store: &InMemoryIdentityStore, key: Permission) -> PermissionRecord {
        store
            .create_permission(PermissionRecord::new(key.as_str().to_string(), key))
            .await
            .unwrap()
    }

    async fn fixture() -> Fixture {
        let store = InMemoryIdentityStore::new();
        for key in [keys::CASE_VIEW_ALL, keys::CASE_EDIT, keys::DOC_VIEW, keys::DOC_DELETE] {
            permission(&store, key).await;
        }
        permission(&store, Permission::wildcard()).await;

        let lawyer = store
            .create_role(RoleRecord::new("Lawyer", RoleKey::new("lawyer")))
            .await
            .unwrap();
        store
            .sync_role_permissions(lawyer.id, &[keys::CASE_VIEW_ALL, keys::CASE_EDIT, keys::DOC_VIEW])
            .await
            .unwrap();

        let user = store
            .create_user(User::new("Lee Lawyer", "lee@firm.example", "hash", Utc::now()).unwrap())
            .await
            .unwrap();
        store.assign_role(user.id, lawyer.id).await.unwrap();

        Fixture {
            store,
            user: user.id,
            lawyer: lawyer.id,
        }
    }

    fn menu_item(path: &str, parent: Option<MenuItemId>) -> MenuItem {
        MenuItem {
            id: MenuItemId::new(),
            path: path.to_string(),
            label: path.trim_start_matches('/').to_string(),
            icon: "folder".to_string(),
            sort_order: 0,
            is_active: true,
            parent_id: parent,
        }
    }

    #[tokio::test]
    async fn effective_permissions_are_the_role_union() {
        let f = fixture().await;
        let paralegal = f
            .store
            .create_role(RoleRecord::new("Paralegal", RoleKey::new("paralegal")))
            .await
            .unwrap();
        f.store.sync_role_permissions(paralegal.id, &[keys::DOC_DELETE]).await.unwrap();
        f.store.assign_role(f.user, paralegal.id).await.unwrap();

        let effective = f.store.effective_permissions(f.user).await.unwrap();
        assert!(has_permission(&effective, &keys::CASE_EDIT));
        assert!(has_permission(&effective, &keys::DOC_DELETE));
        assert!(!has_permission(&effective, &keys::FINANCE_VIEW));
    }

    #[tokio::test]
    async fn user_without_roles_has_nothing() {
        let f = fixture().await;
        f.store.revoke_role(f.user, f.lawyer).await.unwrap();
        assert!(f.store.effective_permissions(f.user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn wildcard_role_collapses_to_all() {
        let f = fixture().await;
        let admin = f
            .store
            .create_role(RoleRecord::new("Admin", RoleKey::new("admin")))
            .await
            .unwrap();
        f.store.sync_role_permissions(admin.id, &[Permission::wildcard()]).await.unwrap();
        f.store.assign_role(f.user, admin.id).await.unwrap();

        assert!(f.store.effective_permissions(f.user).await.unwrap().is_all());
    }

    #[tokio::test]
    async fn tombstoned_rows_stop_contributing() {
        let f = fixture().await;

        let doc_view = f.store.permission_by_key("DOC_VIEW").await.unwrap().unwrap();
        f.store.soft_delete_permission(doc_view.id).await.unwrap();
        let effective = f.store.effective_permissions(f.user).await.unwrap();
        assert!(!has_permission(&effective, &keys::DOC_VIEW));
        assert!(has_permission(&effective, &keys::CASE_EDIT));

        f.store.soft_delete_role(f.lawyer).await.unwrap();
        assert!(f.store.effective_permissions(f.user).await.unwrap().is_empty());
        assert!(f.store.roles_for_user(f.user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleted_user_is_invisible() {
        let f = fixture().await;
        f.store.soft_delete_user(f.user).await.unwrap();

        assert!(f.store.user(f.user).await.unwrap().is_none());
        assert!(f.store.user_by_email("LEE@firm.example").await.unwrap().is_none());
        assert!(f.store.effective_permissions(f.user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sync_is_all_or_nothing() {
        let f = fixture().await;
        let before = f.store.role_permissions(f.lawyer).await.unwrap();

        let err = f
            .store
            .sync_role_permissions(f.lawyer, &[keys::DOC_DELETE, Permission::new("NO_SUCH_KEY")])
            .await
            .unwrap_err();

        assert!(matches!(err, IdentityError::Validation(_)));
        assert_eq!(f.store.role_permissions(f.lawyer).await.unwrap(), before);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let f = fixture().await;
        let dup = User::new("Other", "LEE@FIRM.example", "hash", Utc::now()).unwrap();
        assert!(matches!(
            f.store.create_user(dup).await,
            Err(IdentityError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn assign_is_idempotent_and_revoke_reports_change() {
        let f = fixture().await;
        assert!(!f.store.assign_role(f.user, f.lawyer).await.unwrap());
        assert!(f.store.revoke_role(f.user, f.lawyer).await.unwrap());
        assert!(!f.store.revoke_role(f.user, f.lawyer).await.unwrap());
    }

    #[tokio::test]
    async fn menu_for_role_uses_visibility_rows() {
        let f = fixture().await;
        let cases = f.store.upsert_menu_item(menu_item("/cases", None)).await.unwrap();
        let finance = f.store.upsert_menu_item(menu_item("/finance", None)).await.unwrap();
        f.store
            .sync_role_menus(f.lawyer, &[(cases.id, true), (finance.id, false)])
            .await
            .unwrap();

        let tree = f.store.menu_for_role(f.lawyer).await.unwrap();
        assert_eq!(tree.iter().map(|n| n.path.as_str()).collect::<Vec<_>>(), vec!["/cases"]);

        f.store.soft_delete_role(f.lawyer).await.unwrap();
        assert!(f.store.menu_for_role(f.lawyer).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sync_menus_rejects_unknown_items_without_changes() {
        let f = fixture().await;
        let cases = f.store.upsert_menu_item(menu_item("/cases", None)).await.unwrap();
        f.store.sync_role_menus(f.lawyer, &[(cases.id, true)]).await.unwrap();

        let err = f
            .store
            .sync_role_menus(f.lawyer, &[(cases.id, false), (MenuItemId::new(), true)])
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Validation(_)));
        assert_eq!(f.store.menu_for_role(f.lawyer).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reparenting_under_a_descendant_is_rejected() {
        let store = InMemoryIdentityStore::new();
        let root = store.upsert_menu_item(menu_item("/cases", None)).await.unwrap();
        let child = store
            .upsert_menu_item(menu_item("/cases/open", Some(root.id)))
            .await
            .unwrap();

        let mut moved = root.clone();
        moved.parent_id = Some(child.id);
        assert_eq!(store.upsert_menu_item(moved).await, Err(IdentityError::MenuCycle));

        let mut own_parent = child.clone();
        own_parent.parent_id = Some(child.id);
        assert_eq!(store.upsert_menu_item(own_parent).await, Err(IdentityError::MenuCycle));
    }

    #[tokio::test]
    async fn duplicate_menu_path_is_a_conflict() {
        let store = InMemoryIdentityStore::new();
        store.upsert_menu_item(menu_item("/cases", None)).await.unwrap();
        assert!(matches!(
            store.upsert_menu_item(menu_item("/cases", None)).await,
            Err(IdentityError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn deleting_a_parent_cascades() {
        let f = fixture().await;
        let root = f.store.upsert_menu_item(menu_item("/cases", None)).await.unwrap();
        let child = f
            .store
            .upsert_menu_item(menu_item("/cases/open", Some(root.id)))
            .await
            .unwrap();
        f.store
            .upsert_menu_item(menu_item("/cases/open/mine", Some(child.id)))
            .await
            .unwrap();
        let other = f.store.upsert_menu_item(menu_item("/documents", None)).await.unwrap();
        f.store.sync_role_menus(f.lawyer, &[(root.id, true), (other.id, true)]).await.unwrap();

        assert_eq!(f.store.delete_menu_item(root.id).await.unwrap(), 3);

        let remaining = f.store.menu_items().await.unwrap();
        assert_eq!(remaining.len(), 1);
        let tree = f.store.menu_for_role(f.lawyer).await.unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id, other.id);
    }
}
