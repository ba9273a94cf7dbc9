use chrono::{DateTime, Utc};
use sqlx::{PgPool, QueryBuilder, Row};
use tracing::instrument;

use lexdesk_core::{AuditLogId, Tombstone, UserId};
use lexdesk_history::{AuditFilter, AuditRecord, AuditStore, HistoryError};

use super::map_sqlx_error;

/// Postgres-backed append-only audit log.
///
/// Rows are never updated except for the retention tombstone
/// (`deleted_at`), and every listing excludes tombstoned rows.
#[derive(Debug, Clone)]
pub struct PostgresAuditStore {
    pool: PgPool,
}

impl PostgresAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AuditStore for PostgresAuditStore {
    #[instrument(
        skip(self, record),
        fields(entity_type = %record.entity_type, entity_id = %record.entity_id, action = %record.action),
        err
    )]
    async fn append(&self, record: AuditRecord) -> Result<(), HistoryError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (
                id, actor_user_id, entity_type, entity_id, action, metadata, ip, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.actor_user_id.map(|u| *u.as_uuid()))
        .bind(&record.entity_type)
        .bind(&record.entity_id)
        .bind(&record.action)
        .bind(&record.metadata)
        .bind(&record.ip)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_audit_log", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, HistoryError> {
        let mut query = QueryBuilder::new(
            "SELECT id, actor_user_id, entity_type, entity_id, action, metadata, ip, created_at \
             FROM audit_logs WHERE deleted_at IS NULL",
        );
        if let Some(actor) = filter.actor_user_id {
            query.push(" AND actor_user_id = ").push_bind(*actor.as_uuid());
        }
        if let Some(entity_type) = &filter.entity_type {
            query.push(" AND entity_type = ").push_bind(entity_type.clone());
        }
        if let Some(entity_id) = &filter.entity_id {
            query.push(" AND entity_id = ").push_bind(entity_id.clone());
        }
        if let Some(action) = &filter.action {
            query.push(" AND upper(action) = upper(").push_bind(action.clone()).push(")");
        }
        query.push(" ORDER BY created_at DESC, id DESC");
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_audit_logs", e))?;

        rows.iter()
            .map(|row| {
                let actor: Option<uuid::Uuid> = row.try_get("actor_user_id")?;
                Ok(AuditRecord {
                    id: AuditLogId::from_uuid(row.try_get("id")?),
                    actor_user_id: actor.map(UserId::from_uuid),
                    entity_type: row.try_get("entity_type")?,
                    entity_id: row.try_get("entity_id")?,
                    action: row.try_get("action")?,
                    metadata: row.try_get("metadata")?,
                    ip: row.try_get("ip")?,
                    created_at: row.try_get("created_at")?,
                    tombstone: Tombstone::Live,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| map_sqlx_error("decode_audit_log", e))
    }

    #[instrument(skip(self), err)]
    async fn soft_delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, HistoryError> {
        let result = sqlx::query(
            "UPDATE audit_logs SET deleted_at = NOW() WHERE deleted_at IS NULL AND created_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("soft_delete_audit_logs", e))?;

        Ok(result.rows_affected())
    }
}
