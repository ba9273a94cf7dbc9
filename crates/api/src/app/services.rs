//! Store wiring: in-memory by default, Postgres for the activity logs when
//! `DATABASE_URL` is set.

use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;

use lexdesk_arbitration::ApplicationService;
use lexdesk_history::{AuditStore, InMemoryAuditStore, InMemoryTimelineStore, TimelineRecorder, TimelineStore};
use lexdesk_infra::{
    AppConfig, IdentityStore, InMemoryIdentityStore, PostgresAuditStore, PostgresTimelineStore, Seed, postgres,
};

use crate::audit::AuditConfig;

/// Shared application services, handed to handlers as `Extension<Arc<AppServices>>`.
pub struct AppServices {
    pub identity: Arc<dyn IdentityStore>,
    pub audit: Arc<dyn AuditStore>,
    pub applications: Arc<ApplicationService>,
    pub trust_forwarded_for: bool,
}

impl AppServices {
    pub fn new(
        identity: Arc<dyn IdentityStore>,
        audit: Arc<dyn AuditStore>,
        timeline: Arc<dyn TimelineStore>,
    ) -> Self {
        Self {
            identity,
            audit,
            applications: Arc::new(ApplicationService::new(TimelineRecorder::new(timeline))),
            trust_forwarded_for: false,
        }
    }

    pub fn with_trusted_proxy(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    /// Audit settings for a route group, carrying the proxy trust setting.
    pub fn audit_config(&self, entity_type: &str) -> AuditConfig {
        AuditConfig::new(entity_type).trusting_forwarded_for(self.trust_forwarded_for)
    }

    /// Everything in memory; used by tests and local runs.
    pub fn in_memory(identity: Arc<dyn IdentityStore>) -> Self {
        Self::new(
            identity,
            Arc::new(InMemoryAuditStore::new()),
            Arc::new(InMemoryTimelineStore::new()),
        )
    }
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let identity: Arc<dyn IdentityStore> = Arc::new(InMemoryIdentityStore::new());

    let seed = match &config.seed_path {
        Some(path) => Seed::from_path(path)?,
        None => Seed::default_seed(),
    };
    seed.apply(identity.as_ref()).await.context("failed to apply identity seed")?;

    let Some(database_url) = &config.database_url else {
        tracing::info!("using in-memory audit and timeline stores");
        return Ok(AppServices::in_memory(identity).with_trusted_proxy(config.trust_forwarded_for));
    };

    let pool = PgPool::connect(database_url)
        .await
        .context("failed to connect to DATABASE_URL")?;
    postgres::ensure_schema(&pool)
        .await
        .context("failed to prepare activity tables")?;
    tracing::info!("using postgres audit and timeline stores");

    Ok(AppServices::new(
        identity,
        Arc::new(PostgresAuditStore::new(pool.clone())),
        Arc::new(PostgresTimelineStore::new(pool)),
    )
    .with_trusted_proxy(config.trust_forwarded_for))
}
