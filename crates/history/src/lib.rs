//! `lexdesk-history` — append-only activity history.
//!
//! Two independent logs live here:
//! - **audit**: a security/compliance record of every guarded request
//! - **timeline**: a user-facing narrative of business changes per entity
//!
//! Both are insert-only. Store traits are async so that the Postgres
//! adapters in `lexdesk-infra` and the in-memory stores here are
//! interchangeable behind `Arc<dyn ...>`.

pub mod audit;
pub mod error;
pub mod in_memory;
pub mod timeline;

pub use audit::{AuditFilter, AuditRecord, AuditStore};
pub use error::HistoryError;
pub use in_memory::{InMemoryAuditStore, InMemoryTimelineStore};
pub use timeline::{FieldChange, NewTimelineEvent, Order, TimelineEvent, TimelineRecorder, TimelineStore};
