use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Wildcard permission key: holding it bypasses every permission check.
pub const WILDCARD: &str = "*";

/// Permission key.
///
/// Permissions are modeled as opaque, stable machine keys (e.g. "CASE_EDIT").
/// The special wildcard key `"*"` means "all permissions"; it is granted to
/// administrative roles instead of enumerating every key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(key: impl Into<Cow<'static, str>>) -> Self {
        Self(key.into())
    }

    pub const fn from_static(key: &'static str) -> Self {
        Self(Cow::Borrowed(key))
    }

    pub fn wildcard() -> Self {
        Self::from_static(WILDCARD)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == WILDCARD
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Permission keys referenced by the built-in route groups and seed.
pub mod keys {
    use super::Permission;

    pub const CASE_VIEW_ALL: Permission = Permission::from_static("CASE_VIEW_ALL");
    pub const CASE_EDIT: Permission = Permission::from_static("CASE_EDIT");
    pub const DOC_VIEW: Permission = Permission::from_static("DOC_VIEW");
    pub const DOC_DELETE: Permission = Permission::from_static("DOC_DELETE");
    pub const FINANCE_VIEW: Permission = Permission::from_static("FINANCE_VIEW");
    pub const APPLICATION_VIEW: Permission = Permission::from_static("APPLICATION_VIEW");
    pub const APPLICATION_EDIT: Permission = Permission::from_static("APPLICATION_EDIT");
    pub const APPLICATION_DELETE: Permission = Permission::from_static("APPLICATION_DELETE");
    pub const ROLE_MANAGE: Permission = Permission::from_static("ROLE_MANAGE");
    pub const AUDIT_VIEW: Permission = Permission::from_static("AUDIT_VIEW");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_is_recognized() {
        assert!(Permission::wildcard().is_wildcard());
        assert!(Permission::new("*").is_wildcard());
        assert!(!keys::CASE_EDIT.is_wildcard());
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&keys::DOC_DELETE).unwrap();
        assert_eq!(json, "\"DOC_DELETE\"");
        let back: Permission = serde_json::from_str(&json).unwrap();
        assert_eq!(back, keys::DOC_DELETE);
    }
}
