//! Postgres adapters for the audit log and the entity timelines.
//!
//! ## Error Mapping
//!
//! Every SQLx error surfaces as `HistoryError::Persistence` with the failing
//! operation name. A unique violation on `(entity_id, sequence)` means two
//! writers raced past the advisory lock, which should not happen.

mod audit;
mod timeline;

pub use audit::PostgresAuditStore;
pub use timeline::PostgresTimelineStore;

use sqlx::PgPool;

use lexdesk_history::HistoryError;

/// Create the activity tables if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), HistoryError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_logs (
            id            UUID PRIMARY KEY,
            actor_user_id UUID NULL,
            entity_type   TEXT NOT NULL,
            entity_id     TEXT NOT NULL,
            action        TEXT NOT NULL,
            metadata      JSONB NOT NULL,
            ip            TEXT NULL,
            created_at    TIMESTAMPTZ NOT NULL,
            deleted_at    TIMESTAMPTZ NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| map_sqlx_error("create_audit_logs", e))?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS audit_logs_entity_idx
            ON audit_logs (entity_type, entity_id, created_at DESC)
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| map_sqlx_error("create_audit_logs_index", e))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS timeline_events (
            id          UUID PRIMARY KEY,
            entity_id   UUID NOT NULL,
            sequence    BIGINT NOT NULL CHECK (sequence > 0),
            event_type  TEXT NOT NULL CHECK (event_type <> ''),
            description TEXT NOT NULL,
            event_data  JSONB NOT NULL,
            user_id     UUID NULL,
            created_at  TIMESTAMPTZ NOT NULL,
            UNIQUE (entity_id, sequence)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| map_sqlx_error("create_timeline_events", e))?;

    Ok(())
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> HistoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();
            HistoryError::persistence(format!(
                "database error in {operation} ({code}): {}",
                db_err.message()
            ))
        }
        sqlx::Error::PoolClosed => HistoryError::persistence(format!("connection pool closed during {operation}")),
        other => HistoryError::persistence(format!("{operation} failed: {other}")),
    }
}
