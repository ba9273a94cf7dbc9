use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Stable machine key of a role (e.g. "admin", "lawyer").
///
/// The human-readable name lives on [`crate::RoleRecord`]; the key is what
/// seeds, tokens and administrative tooling refer to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleKey(Cow<'static, str>);

impl RoleKey {
    pub fn new(key: impl Into<Cow<'static, str>>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RoleKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
