//! `lexdesk-core` — shared identifiers, error model and soft-deletion marker.
//!
//! This crate contains **pure** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod tombstone;

pub use error::{DomainError, DomainResult};
pub use id::{
    AuditLogId, EntityId, MenuItemId, PermissionId, RoleId, TimelineEventId, UserId,
};
pub use tombstone::Tombstone;
