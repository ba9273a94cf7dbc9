//! Per-entity timeline of business events.
//!
//! Events are appended at well-defined transition points by business
//! handlers and never mutated afterwards. Each entity's stream carries a
//! gap-free sequence number starting at 1, so replay order is explicit and
//! does not depend on clock resolution.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};

use lexdesk_core::{EntityId, TimelineEventId, UserId};

use crate::HistoryError;

/// A stored timeline event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: TimelineEventId,
    pub entity_id: EntityId,
    /// Position in the entity stream (1-based, strictly increasing).
    pub sequence: u64,
    pub event_type: String,
    pub description: String,
    pub event_data: JsonValue,
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// An event ready to be appended (not yet assigned id, sequence or timestamp).
#[derive(Debug, Clone, PartialEq)]
pub struct NewTimelineEvent {
    pub entity_id: EntityId,
    pub event_type: String,
    pub description: String,
    pub event_data: JsonValue,
    pub user_id: Option<UserId>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    /// Display order.
    #[default]
    NewestFirst,
    /// Replay order.
    OldestFirst,
}

/// Append-only timeline storage.
#[async_trait::async_trait]
pub trait TimelineStore: Send + Sync {
    /// Insert a new event at the end of the entity's stream.
    async fn append(&self, event: NewTimelineEvent) -> Result<TimelineEvent, HistoryError>;

    /// All events for `entity_id` in ascending sequence order.
    async fn load(&self, entity_id: EntityId) -> Result<Vec<TimelineEvent>, HistoryError>;
}

/// One tracked field's before/after values.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: String,
    pub old: JsonValue,
    pub new: JsonValue,
}

impl FieldChange {
    pub fn new<T: Serialize>(field: impl Into<String>, old: &T, new: &T) -> Self {
        Self {
            field: field.into(),
            old: serde_json::to_value(old).unwrap_or(JsonValue::Null),
            new: serde_json::to_value(new).unwrap_or(JsonValue::Null),
        }
    }

    pub fn is_change(&self) -> bool {
        self.old != self.new
    }
}

/// Appends timeline events on behalf of business handlers.
///
/// Append failures are returned to the caller: a timeline entry is part of the
/// business outcome, so the surrounding operation must fail with it.
#[derive(Clone)]
pub struct TimelineRecorder {
    store: Arc<dyn TimelineStore>,
}

impl TimelineRecorder {
    pub fn new(store: Arc<dyn TimelineStore>) -> Self {
        Self { store }
    }

    pub async fn append(
        &self,
        entity_id: EntityId,
        event_type: impl Into<String>,
        description: impl Into<String>,
        event_data: JsonValue,
        acting_user: Option<UserId>,
    ) -> Result<TimelineEvent, HistoryError> {
        let event_type = event_type.into();
        if event_type.trim().is_empty() {
            return Err(HistoryError::Invalid("event type must not be empty".to_string()));
        }

        let event = self
            .store
            .append(NewTimelineEvent {
                entity_id,
                event_type,
                description: description.into(),
                event_data,
                user_id: acting_user,
            })
            .await?;

        tracing::debug!(
            entity_id = %event.entity_id,
            sequence = event.sequence,
            event_type = %event.event_type,
            "timeline event appended"
        );
        Ok(event)
    }

    pub async fn record_created(
        &self,
        entity_id: EntityId,
        description: impl Into<String>,
        snapshot: JsonValue,
        acting_user: Option<UserId>,
    ) -> Result<TimelineEvent, HistoryError> {
        self.append(entity_id, "created", description, snapshot, acting_user).await
    }

    /// Record a field update. Returns `Ok(None)` without writing anything when
    /// no tracked field actually changed value.
    pub async fn record_updated(
        &self,
        entity_id: EntityId,
        changes: &[FieldChange],
        acting_user: Option<UserId>,
    ) -> Result<Option<TimelineEvent>, HistoryError> {
        let changed: Vec<&FieldChange> = changes.iter().filter(|c| c.is_change()).collect();
        if changed.is_empty() {
            return Ok(None);
        }

        let mut data = Map::new();
        for change in &changed {
            data.insert(
                change.field.clone(),
                json!({ "old": change.old, "new": change.new }),
            );
        }
        let fields: Vec<&str> = changed.iter().map(|c| c.field.as_str()).collect();
        let description = format!("Updated {}", fields.join(", "));

        self.append(entity_id, "updated", description, json!({ "changes": data }), acting_user)
            .await
            .map(Some)
    }

    /// Record an assignment for `slot` (e.g. "mediator").
    ///
    /// Emits `<slot>_assigned` when nobody held the slot before and
    /// `<slot>_changed` (with both ids) otherwise. Re-assigning the current
    /// holder is a no-op and returns `Ok(None)`.
    pub async fn record_assignment(
        &self,
        entity_id: EntityId,
        slot: &str,
        previous: Option<UserId>,
        next: UserId,
        acting_user: Option<UserId>,
    ) -> Result<Option<TimelineEvent>, HistoryError> {
        let (event_type, description, data) = match previous {
            Some(prev) if prev == next => return Ok(None),
            Some(prev) => (
                format!("{slot}_changed"),
                format!("Changed {slot} from {prev} to {next}"),
                json!({
                    format!("old_{slot}_id"): prev,
                    format!("new_{slot}_id"): next,
                }),
            ),
            None => (
                format!("{slot}_assigned"),
                format!("Assigned {slot} {next}"),
                json!({ format!("{slot}_id"): next }),
            ),
        };

        self.append(entity_id, event_type, description, data, acting_user)
            .await
            .map(Some)
    }

    /// Record a status transition. Legality of the transition is the caller's
    /// concern; every transition handed in is recorded.
    pub async fn record_status_change(
        &self,
        entity_id: EntityId,
        old: &str,
        new: &str,
        note: Option<&str>,
        acting_user: Option<UserId>,
    ) -> Result<TimelineEvent, HistoryError> {
        let description = match note {
            Some(n) => format!("Status changed from {old} to {new}: {n}"),
            None => format!("Status changed from {old} to {new}"),
        };
        let data = json!({ "old": old, "new": new, "note": note });

        self.append(entity_id, "status_changed", description, data, acting_user).await
    }

    pub async fn record_deleted(
        &self,
        entity_id: EntityId,
        description: impl Into<String>,
        acting_user: Option<UserId>,
    ) -> Result<TimelineEvent, HistoryError> {
        self.append(entity_id, "deleted", description, JsonValue::Null, acting_user).await
    }

    pub async fn history(&self, entity_id: EntityId, order: Order) -> Result<Vec<TimelineEvent>, HistoryError> {
        let mut events = self.store.load(entity_id).await?;
        if order == Order::NewestFirst {
            events.reverse();
        }
        Ok(events)
    }
}
