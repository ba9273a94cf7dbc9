use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{Span, instrument};

use lexdesk_core::{EntityId, TimelineEventId, UserId};
use lexdesk_history::{HistoryError, NewTimelineEvent, TimelineEvent, TimelineStore};

use super::map_sqlx_error;

/// Postgres-backed timeline store.
///
/// `append` runs in a transaction holding a per-entity advisory lock, so
/// concurrent writers for the same entity are serialized and sequence
/// numbers stay gap-free. The `(entity_id, sequence)` unique constraint
/// backs this up at the schema level.
#[derive(Debug, Clone)]
pub struct PostgresTimelineStore {
    pool: PgPool,
}

impl PostgresTimelineStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TimelineStore for PostgresTimelineStore {
    #[instrument(
        skip(self, event),
        fields(entity_id = %event.entity_id, event_type = %event.event_type, sequence = tracing::field::Empty),
        err
    )]
    async fn append(&self, event: NewTimelineEvent) -> Result<TimelineEvent, HistoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(event.entity_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_stream", e))?;

        let head = sqlx::query(
            r#"
            SELECT COALESCE(MAX(sequence), 0) AS sequence, MAX(created_at) AS created_at
            FROM timeline_events
            WHERE entity_id = $1
            "#,
        )
        .bind(event.entity_id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("read_stream_head", e))?;

        let last_sequence: i64 = head
            .try_get("sequence")
            .map_err(|e| map_sqlx_error("decode_stream_head", e))?;
        let last_created: Option<DateTime<Utc>> = head
            .try_get("created_at")
            .map_err(|e| map_sqlx_error("decode_stream_head", e))?;

        let sequence = last_sequence + 1;
        let created_at = last_created.map_or_else(Utc::now, |last| Utc::now().max(last));
        let id = TimelineEventId::new();

        sqlx::query(
            r#"
            INSERT INTO timeline_events (
                id, entity_id, sequence, event_type, description, event_data, user_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id.as_uuid())
        .bind(event.entity_id.as_uuid())
        .bind(sequence)
        .bind(&event.event_type)
        .bind(&event.description)
        .bind(&event.event_data)
        .bind(event.user_id.map(|u| *u.as_uuid()))
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_timeline_event", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Span::current().record("sequence", sequence);
        Ok(TimelineEvent {
            id,
            entity_id: event.entity_id,
            sequence: sequence as u64,
            event_type: event.event_type,
            description: event.description,
            event_data: event.event_data,
            user_id: event.user_id,
            created_at,
        })
    }

    #[instrument(skip(self), err)]
    async fn load(&self, entity_id: EntityId) -> Result<Vec<TimelineEvent>, HistoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, entity_id, sequence, event_type, description, event_data, user_id, created_at
            FROM timeline_events
            WHERE entity_id = $1
            ORDER BY sequence ASC
            "#,
        )
        .bind(entity_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_timeline", e))?;

        rows.iter()
            .map(|row| {
                let sequence: i64 = row.try_get("sequence")?;
                let user_id: Option<uuid::Uuid> = row.try_get("user_id")?;
                Ok(TimelineEvent {
                    id: TimelineEventId::from_uuid(row.try_get("id")?),
                    entity_id: EntityId::from_uuid(row.try_get("entity_id")?),
                    sequence: sequence as u64,
                    event_type: row.try_get("event_type")?,
                    description: row.try_get("description")?,
                    event_data: row.try_get("event_data")?,
                    user_id: user_id.map(UserId::from_uuid),
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| map_sqlx_error("decode_timeline_event", e))
    }
}
