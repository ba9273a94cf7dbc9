use std::collections::HashMap;

use chrono::Utc;
use serde_json::json;
use tokio::sync::RwLock;

use lexdesk_core::{EntityId, UserId};
use lexdesk_history::{Order, TimelineEvent, TimelineRecorder};

use crate::{ApplicationError, ApplicationPatch, ApplicationStatus, ArbitrationApplication, NewApplication};

/// Application handler.
///
/// Each operation holds the repository write lock across its timeline append
/// and only stores the new state once the append succeeded, so the stored
/// application and its timeline never disagree.
pub struct ApplicationService {
    repo: RwLock<HashMap<EntityId, ArbitrationApplication>>,
    timeline: TimelineRecorder,
}

impl ApplicationService {
    pub fn new(timeline: TimelineRecorder) -> Self {
        Self {
            repo: RwLock::new(HashMap::new()),
            timeline,
        }
    }

    pub async fn create(
        &self,
        input: NewApplication,
        actor: Option<UserId>,
    ) -> Result<ArbitrationApplication, ApplicationError> {
        let app = ArbitrationApplication::create(input, actor, Utc::now())?;

        let mut repo = self.repo.write().await;
        self.timeline
            .record_created(
                app.id,
                format!("Application \"{}\" created", app.title),
                json!({
                    "title": app.title,
                    "claimant": app.claimant,
                    "respondent": app.respondent,
                    "claim_amount": app.claim_amount,
                    "status": app.status,
                }),
                actor,
            )
            .await?;
        repo.insert(app.id, app.clone());

        tracing::info!(application_id = %app.id, "arbitration application created");
        Ok(app)
    }

    pub async fn get(&self, id: EntityId) -> Option<ArbitrationApplication> {
        self.repo.read().await.get(&id).cloned()
    }

    /// All applications, oldest first.
    pub async fn list(&self) -> Vec<ArbitrationApplication> {
        let mut all: Vec<_> = self.repo.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    pub async fn update(
        &self,
        id: EntityId,
        patch: ApplicationPatch,
        actor: Option<UserId>,
    ) -> Result<ArbitrationApplication, ApplicationError> {
        let mut repo = self.repo.write().await;
        let current = repo.get(&id).ok_or(ApplicationError::NotFound)?;
        let (next, changes) = current.patched(&patch, Utc::now())?;

        if self.timeline.record_updated(id, &changes, actor).await?.is_some() {
            repo.insert(id, next.clone());
        }
        Ok(next)
    }

    pub async fn assign_mediator(
        &self,
        id: EntityId,
        mediator: UserId,
        actor: Option<UserId>,
    ) -> Result<ArbitrationApplication, ApplicationError> {
        let mut repo = self.repo.write().await;
        let current = repo.get(&id).ok_or(ApplicationError::NotFound)?;

        let mut next = current.clone();
        if self
            .timeline
            .record_assignment(id, "mediator", current.mediator_id, mediator, actor)
            .await?
            .is_some()
        {
            next.mediator_id = Some(mediator);
            next.updated_at = Utc::now();
            repo.insert(id, next.clone());
        }
        Ok(next)
    }

    /// Move the application to `raw_status`.
    ///
    /// Unknown status strings are rejected before anything is written.
    pub async fn change_status(
        &self,
        id: EntityId,
        raw_status: &str,
        note: Option<String>,
        actor: Option<UserId>,
    ) -> Result<ArbitrationApplication, ApplicationError> {
        let status: ApplicationStatus = raw_status.parse()?;

        let mut repo = self.repo.write().await;
        let current = repo.get(&id).ok_or(ApplicationError::NotFound)?;
        let old = current.status;

        self.timeline
            .record_status_change(id, old.as_str(), status.as_str(), note.as_deref(), actor)
            .await?;

        let mut next = current.clone();
        next.status = status;
        next.updated_at = Utc::now();
        repo.insert(id, next.clone());

        tracing::info!(application_id = %id, %old, new = %status, "application status changed");
        Ok(next)
    }

    pub async fn delete(&self, id: EntityId, actor: Option<UserId>) -> Result<(), ApplicationError> {
        let mut repo = self.repo.write().await;
        let current = repo.get(&id).ok_or(ApplicationError::NotFound)?;

        self.timeline
            .record_deleted(id, format!("Application \"{}\" deleted", current.title), actor)
            .await?;
        repo.remove(&id);
        Ok(())
    }

    /// Timeline of an application. Remains readable after deletion.
    pub async fn timeline(&self, id: EntityId, order: Order) -> Result<Vec<TimelineEvent>, ApplicationError> {
        Ok(self.timeline.history(id, order).await?)
    }
}
