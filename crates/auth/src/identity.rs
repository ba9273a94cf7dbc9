//! Identity data model: users, roles, permissions and their associations.
//!
//! These are plain records. Lookups, grants and soft deletion are implemented
//! by the identity store in `lexdesk-infra`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lexdesk_core::{DomainError, DomainResult, PermissionId, RoleId, Tombstone, UserId};

use crate::{Permission, RoleKey};

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// An account that can authenticate.
///
/// # Invariants
/// - `id` is immutable after creation.
/// - `email` is stored trimmed and lowercased; uniqueness is enforced by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub credential_hash: String,
    pub tombstone: Tombstone,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        name: impl Into<String>,
        email: &str,
        credential_hash: impl Into<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("user name must not be empty"));
        }

        Ok(Self {
            id: UserId::new(),
            name,
            email: normalize_email(email)?,
            credential_hash: credential_hash.into(),
            tombstone: Tombstone::Live,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_live(&self) -> bool {
        self.tombstone.is_live()
    }
}

/// Trim + lowercase, with a minimal shape check.
pub fn normalize_email(email: &str) -> DomainResult<String> {
    let normalized = email.trim().to_lowercase();
    let valid = normalized
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(DomainError::validation(format!("invalid email: {email}")));
    }
    Ok(normalized)
}

// ─────────────────────────────────────────────────────────────────────────────
// Role / Permission
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: RoleId,
    pub name: String,
    pub key: RoleKey,
    pub tombstone: Tombstone,
}

impl RoleRecord {
    pub fn new(name: impl Into<String>, key: RoleKey) -> Self {
        Self {
            id: RoleId::new(),
            name: name.into(),
            key,
            tombstone: Tombstone::Live,
        }
    }

    pub fn is_live(&self) -> bool {
        self.tombstone.is_live()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub id: PermissionId,
    pub name: String,
    pub key: Permission,
    pub tombstone: Tombstone,
}

impl PermissionRecord {
    pub fn new(name: impl Into<String>, key: Permission) -> Self {
        Self {
            id: PermissionId::new(),
            name: name.into(),
            key,
            tombstone: Tombstone::Live,
        }
    }

    pub fn is_live(&self) -> bool {
        self.tombstone.is_live()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Associations
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRole {
    pub user_id: UserId,
    pub role_id: RoleId,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RolePermission {
    pub role_id: RoleId,
    pub permission_id: PermissionId,
}
