//! Audit records: one immutable row per guarded request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use lexdesk_core::{AuditLogId, Tombstone, UserId};

use crate::HistoryError;

/// An audit log entry.
///
/// `entity_id` is kept as text: it is either the raw `id` path parameter of
/// the guarded route or a freshly generated UUID for collection-level actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditLogId,
    pub actor_user_id: Option<UserId>,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub metadata: JsonValue,
    pub ip: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing, default)]
    pub tombstone: Tombstone,
}

impl AuditRecord {
    pub fn new(
        actor_user_id: Option<UserId>,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        action: impl Into<String>,
        metadata: JsonValue,
        ip: Option<String>,
    ) -> Self {
        Self {
            id: AuditLogId::new(),
            actor_user_id,
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            action: action.into(),
            metadata,
            ip,
            created_at: Utc::now(),
            tombstone: Tombstone::Live,
        }
    }
}

/// Query filter for audit listings. Every set field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuditFilter {
    pub actor_user_id: Option<UserId>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub action: Option<String>,
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn matches(&self, record: &AuditRecord) -> bool {
        record.tombstone.is_live()
            && self.actor_user_id.is_none_or(|a| record.actor_user_id == Some(a))
            && self.entity_type.as_deref().is_none_or(|t| record.entity_type == t)
            && self.entity_id.as_deref().is_none_or(|e| record.entity_id == e)
            && self.action.as_deref().is_none_or(|a| record.action.eq_ignore_ascii_case(a))
    }
}

/// Append-only audit storage.
///
/// There is deliberately no update operation. `soft_delete_before` exists for
/// retention jobs only.
#[async_trait::async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, record: AuditRecord) -> Result<(), HistoryError>;

    /// Live records matching `filter`, newest first.
    async fn list(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, HistoryError>;

    /// Tombstone every live record created before `cutoff`; returns the count.
    async fn soft_delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, HistoryError>;
}
