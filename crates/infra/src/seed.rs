//! Static identity seed.
//!
//! A seed describes permissions, roles (by key, with their permission keys
//! and visible menu paths), menu items and users. It is applied once at
//! startup through [`IdentityStore`]; rows that already exist are reused,
//! so applying the same seed twice is harmless.

use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use lexdesk_auth::{MenuItem, Permission, PermissionRecord, RoleKey, RoleRecord, User, permissions::WILDCARD};
use lexdesk_core::{MenuItemId, RoleId};

use crate::config::ConfigError;
use crate::identity::{IdentityError, IdentityStore};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub permissions: Vec<SeedPermission>,
    #[serde(default)]
    pub menu_items: Vec<SeedMenuItem>,
    #[serde(default)]
    pub roles: Vec<SeedRole>,
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPermission {
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedMenuItem {
    pub path: String,
    pub label: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "active")]
    pub is_active: bool,
    /// Path of the parent item; must appear earlier in the list.
    #[serde(default)]
    pub parent: Option<String>,
}

fn active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedRole {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Menu paths this role sees. Anything not listed stays hidden.
    #[serde(default)]
    pub menus: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedUser {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub credential_hash: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub permissions: usize,
    pub menu_items: usize,
    pub roles: usize,
    pub users: usize,
}

impl Seed {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let seed_error = |reason: String| ConfigError::Seed {
            path: path.display().to_string(),
            reason,
        };

        let raw = std::fs::read_to_string(path).map_err(|e| seed_error(e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| seed_error(e.to_string()))
    }

    /// The built-in law-office roles and navigation.
    pub fn default_seed() -> Self {
        use lexdesk_auth::permissions::keys::*;

        let permissions = [
            (WILDCARD, "All permissions"),
            (CASE_VIEW_ALL.as_str(), "View all cases"),
            (CASE_EDIT.as_str(), "Edit cases"),
            (DOC_VIEW.as_str(), "View documents"),
            (DOC_DELETE.as_str(), "Delete documents"),
            (FINANCE_VIEW.as_str(), "View finance"),
            (APPLICATION_VIEW.as_str(), "View arbitration applications"),
            (APPLICATION_EDIT.as_str(), "Edit arbitration applications"),
            (APPLICATION_DELETE.as_str(), "Delete arbitration applications"),
            (ROLE_MANAGE.as_str(), "Manage roles"),
            (AUDIT_VIEW.as_str(), "View audit log"),
        ]
        .into_iter()
        .map(|(key, name)| SeedPermission {
            key: key.to_string(),
            name: name.to_string(),
        })
        .collect();

        let menu = |path: &str, label: &str, icon: &str, sort_order: i32, parent: Option<&str>| SeedMenuItem {
            path: path.to_string(),
            label: label.to_string(),
            icon: icon.to_string(),
            sort_order,
            is_active: true,
            parent: parent.map(str::to_string),
        };
        let menu_items = vec![
            menu("/dashboard", "Dashboard", "home", 0, None),
            menu("/cases", "Cases", "briefcase", 10, None),
            menu("/documents", "Documents", "file", 20, None),
            menu("/applications", "Arbitration", "scale", 30, None),
            menu("/finance", "Finance", "wallet", 40, None),
            menu("/admin", "Administration", "settings", 90, None),
            menu("/admin/roles", "Roles", "shield", 0, Some("/admin")),
            menu("/admin/audit", "Audit log", "list", 10, Some("/admin")),
        ];

        let role = |key: &str, name: &str, permissions: &[&Permission], menus: &[&str]| SeedRole {
            key: key.to_string(),
            name: name.to_string(),
            permissions: permissions.iter().map(|p| p.as_str().to_string()).collect(),
            menus: menus.iter().map(|m| m.to_string()).collect(),
        };
        let wildcard = Permission::wildcard();
        let roles = vec![
            role("admin", "Administrator", &[&wildcard], &[]),
            role(
                "partner",
                "Partner",
                &[
                    &CASE_VIEW_ALL,
                    &CASE_EDIT,
                    &DOC_VIEW,
                    &DOC_DELETE,
                    &FINANCE_VIEW,
                    &APPLICATION_VIEW,
                    &APPLICATION_EDIT,
                    &APPLICATION_DELETE,
                    &AUDIT_VIEW,
                ],
                &[
                    "/dashboard",
                    "/cases",
                    "/documents",
                    "/applications",
                    "/finance",
                    "/admin",
                    "/admin/audit",
                ],
            ),
            role(
                "lawyer",
                "Lawyer",
                &[&CASE_VIEW_ALL, &CASE_EDIT, &DOC_VIEW, &APPLICATION_VIEW, &APPLICATION_EDIT],
                &["/dashboard", "/cases", "/documents", "/applications"],
            ),
            role(
                "paralegal",
                "Paralegal",
                &[&CASE_VIEW_ALL, &DOC_VIEW, &APPLICATION_VIEW],
                &["/dashboard", "/cases", "/documents"],
            ),
            role(
                "accountant",
                "Accountant",
                &[&FINANCE_VIEW],
                &["/dashboard", "/finance"],
            ),
        ];

        Self {
            permissions,
            menu_items,
            roles,
            users: Vec::new(),
        }
    }

    /// Apply the seed. Existing rows (matched by key, path or email) are
    /// reused; role grants and menu visibility are synced to the seed.
    pub async fn apply(&self, store: &dyn IdentityStore) -> Result<SeedReport, IdentityError> {
        let mut report = SeedReport::default();

        for p in &self.permissions {
            if store.permission_by_key(&p.key).await?.is_none() {
                store
                    .create_permission(PermissionRecord::new(p.name.clone(), Permission::new(p.key.clone())))
                    .await?;
                report.permissions += 1;
            }
        }

        let mut menu_ids: HashMap<String, MenuItemId> = store
            .menu_items()
            .await?
            .into_iter()
            .map(|i| (i.path, i.id))
            .collect();
        for m in &self.menu_items {
            if menu_ids.contains_key(&m.path) {
                continue;
            }
            let parent_id = match &m.parent {
                Some(parent) => Some(
                    *menu_ids
                        .get(parent)
                        .ok_or_else(|| IdentityError::Validation(format!("unknown parent menu path: {parent}")))?,
                ),
                None => None,
            };
            let item = store
                .upsert_menu_item(MenuItem {
                    id: MenuItemId::new(),
                    path: m.path.clone(),
                    label: m.label.clone(),
                    icon: m.icon.clone(),
                    sort_order: m.sort_order,
                    is_active: m.is_active,
                    parent_id,
                })
                .await?;
            menu_ids.insert(item.path, item.id);
            report.menu_items += 1;
        }

        let mut role_ids: HashMap<&str, RoleId> = HashMap::new();
        for r in &self.roles {
            let role = match store.role_by_key(&r.key).await? {
                Some(existing) => existing,
                None => {
                    report.roles += 1;
                    store
                        .create_role(RoleRecord::new(r.name.clone(), RoleKey::new(r.key.clone())))
                        .await?
                }
            };

            let grants: Vec<Permission> = r.permissions.iter().cloned().map(Permission::new).collect();
            store.sync_role_permissions(role.id, &grants).await?;

            let visibility = r
                .menus
                .iter()
                .map(|path| {
                    menu_ids
                        .get(path)
                        .map(|id| (*id, true))
                        .ok_or_else(|| IdentityError::Validation(format!("unknown menu path: {path}")))
                })
                .collect::<Result<Vec<_>, _>>()?;
            store.sync_role_menus(role.id, &visibility).await?;

            role_ids.insert(r.key.as_str(), role.id);
        }

        for u in &self.users {
            let user = match store.user_by_email(&u.email).await? {
                Some(existing) => existing,
                None => {
                    report.users += 1;
                    let user = User::new(u.name.clone(), &u.email, u.credential_hash.clone(), Utc::now())?;
                    store.create_user(user).await?
                }
            };
            for key in &u.roles {
                let role_id = match role_ids.get(key.as_str()) {
                    Some(id) => *id,
                    None => {
                        store
                            .role_by_key(key)
                            .await?
                            .ok_or_else(|| IdentityError::Validation(format!("unknown role: {key}")))?
                            .id
                    }
                };
                store.assign_role(user.id, role_id).await?;
            }
        }

        tracing::info!(
            permissions = report.permissions,
            menu_items = report.menu_items,
            roles = report.roles,
            users = report.users,
            "identity seed applied"
        );
        Ok(report)
    }
}
