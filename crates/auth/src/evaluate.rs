use std::collections::BTreeSet;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::Permission;
use crate::permissions::WILDCARD;

/// A user's effective permission set.
///
/// This is the union of the permissions of all live roles held by a live
/// user. A single wildcard grant collapses the set to [`EffectivePermissions::All`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectivePermissions {
    All,
    Set(BTreeSet<Permission>),
}

impl Default for EffectivePermissions {
    fn default() -> Self {
        Self::none()
    }
}

impl EffectivePermissions {
    pub fn none() -> Self {
        Self::Set(BTreeSet::new())
    }

    /// Build the union of the given grants, short-circuiting on the wildcard.
    pub fn from_grants<I>(grants: I) -> Self
    where
        I: IntoIterator<Item = Permission>,
    {
        let mut set = BTreeSet::new();
        for grant in grants {
            if grant.is_wildcard() {
                return Self::All;
            }
            set.insert(grant);
        }
        Self::Set(set)
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Set(set) if set.is_empty())
    }

    /// Sorted keys for display; the wildcard set renders as `["*"]`.
    pub fn keys(&self) -> Vec<String> {
        match self {
            Self::All => vec![WILDCARD.to_string()],
            Self::Set(set) => set.iter().map(|p| p.as_str().to_string()).collect(),
        }
    }
}

impl Serialize for EffectivePermissions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.keys().serialize(serializer)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// Carries the missing key for server-side logs only; never rendered to clients.
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Decide whether `effective` satisfies `required`.
///
/// - No IO
/// - No panics
/// - Unknown keys are an ordinary miss
pub fn has_permission(effective: &EffectivePermissions, required: &Permission) -> bool {
    match effective {
        EffectivePermissions::All => true,
        EffectivePermissions::Set(set) => set.contains(required),
    }
}

/// `Result` form of [`has_permission`] for gate code that propagates with `?`.
pub fn authorize(effective: &EffectivePermissions, required: &Permission) -> Result<(), AuthzError> {
    if has_permission(effective, required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}
