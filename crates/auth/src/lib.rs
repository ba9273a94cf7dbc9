//! `lexdesk-auth` — pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it owns the
//! identity data model, the permission evaluator, credential verification and
//! the menu composer. Stores live in `lexdesk-infra`, gates in `lexdesk-api`.

pub mod claims;
pub mod evaluate;
pub mod identity;
pub mod jwt;
pub mod menu;
pub mod permissions;
pub mod roles;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use evaluate::{AuthzError, EffectivePermissions, authorize, has_permission};
pub use identity::{PermissionRecord, RolePermission, RoleRecord, User, UserRole};
pub use jwt::{Hs256JwtValidator, JwtValidator, TokenError};
pub use menu::{MenuAccess, MenuItem, MenuNode, MenuPermission, creates_cycle, descendants, menu_for};
pub use permissions::Permission;
pub use roles::RoleKey;
