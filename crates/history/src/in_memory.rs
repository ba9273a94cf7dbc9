//! In-memory audit and timeline stores.
//!
//! Intended for tests/dev. Not optimized for performance.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use lexdesk_core::{EntityId, TimelineEventId, Tombstone};

use crate::audit::{AuditFilter, AuditRecord, AuditStore};
use crate::timeline::{NewTimelineEvent, TimelineEvent, TimelineStore};
use crate::HistoryError;

fn poisoned() -> HistoryError {
    HistoryError::persistence("lock poisoned")
}

#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    records: RwLock<Vec<AuditRecord>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows ever written, tombstoned ones included.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, record: AuditRecord) -> Result<(), HistoryError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        records.push(record);
        Ok(())
    }

    async fn list(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, HistoryError> {
        let records = self.records.read().map_err(|_| poisoned())?;
        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(records
            .iter()
            .rev()
            .filter(|r| filter.matches(r))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn soft_delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, HistoryError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        let mut count = 0;
        for record in records.iter_mut() {
            if record.tombstone.is_live() && record.created_at < cutoff {
                record.tombstone = Tombstone::deleted_now();
                count += 1;
            }
        }
        Ok(count)
    }
}

/// In-memory append-only timeline store.
#[derive(Debug, Default)]
pub struct InMemoryTimelineStore {
    streams: RwLock<HashMap<EntityId, Vec<TimelineEvent>>>,
}

impl InMemoryTimelineStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TimelineStore for InMemoryTimelineStore {
    async fn append(&self, event: NewTimelineEvent) -> Result<TimelineEvent, HistoryError> {
        let mut streams = self.streams.write().map_err(|_| poisoned())?;
        let stream = streams.entry(event.entity_id).or_default();

        let (sequence, created_at) = match stream.last() {
            // Never let the clock run backwards inside one stream.
            Some(last) => (last.sequence + 1, Utc::now().max(last.created_at)),
            None => (1, Utc::now()),
        };

        let stored = TimelineEvent {
            id: TimelineEventId::new(),
            entity_id: event.entity_id,
            sequence,
            event_type: event.event_type,
            description: event.description,
            event_data: event.event_data,
            user_id: event.user_id,
            created_at,
        };
        stream.push(stored.clone());
        Ok(stored)
    }

    async fn load(&self, entity_id: EntityId) -> Result<Vec<TimelineEvent>, HistoryError> {
        let streams = self.streams.read().map_err(|_| poisoned())?;
        Ok(streams.get(&entity_id).cloned().unwrap_or_default())
    }
}
