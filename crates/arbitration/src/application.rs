use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lexdesk_core::{EntityId, UserId};
use lexdesk_history::FieldChange;

use crate::{ApplicationError, ApplicationStatus};

/// An arbitration application filed on behalf of a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbitrationApplication {
    pub id: EntityId,
    pub title: String,
    pub claimant: String,
    pub respondent: String,
    /// Claim amount in the smallest currency unit.
    pub claim_amount: i64,
    pub description: Option<String>,
    pub status: ApplicationStatus,
    pub mediator_id: Option<UserId>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewApplication {
    pub title: String,
    pub claimant: String,
    pub respondent: String,
    #[serde(default)]
    pub claim_amount: i64,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApplicationPatch {
    pub title: Option<String>,
    pub claimant: Option<String>,
    pub respondent: Option<String>,
    pub claim_amount: Option<i64>,
    pub description: Option<String>,
}

impl ArbitrationApplication {
    pub fn create(input: NewApplication, created_by: Option<UserId>, now: DateTime<Utc>) -> Result<Self, ApplicationError> {
        let app = Self {
            id: EntityId::new(),
            title: input.title.trim().to_string(),
            claimant: input.claimant.trim().to_string(),
            respondent: input.respondent.trim().to_string(),
            claim_amount: input.claim_amount,
            description: input.description,
            status: ApplicationStatus::Pending,
            mediator_id: None,
            created_by,
            created_at: now,
            updated_at: now,
        };
        app.validate()?;
        Ok(app)
    }

    fn validate(&self) -> Result<(), ApplicationError> {
        if self.title.is_empty() {
            return Err(ApplicationError::Validation("title must not be empty".to_string()));
        }
        if self.claimant.is_empty() || self.respondent.is_empty() {
            return Err(ApplicationError::Validation(
                "claimant and respondent are required".to_string(),
            ));
        }
        if self.claim_amount < 0 {
            return Err(ApplicationError::Validation("claim amount must not be negative".to_string()));
        }
        Ok(())
    }

    /// Apply `patch` to a copy, returning it with the tracked-field changes.
    ///
    /// The change list includes untouched fields as no-op entries; callers
    /// filter with [`FieldChange::is_change`].
    pub fn patched(&self, patch: &ApplicationPatch, now: DateTime<Utc>) -> Result<(Self, Vec<FieldChange>), ApplicationError> {
        let mut next = self.clone();
        if let Some(title) = &patch.title {
            next.title = title.trim().to_string();
        }
        if let Some(claimant) = &patch.claimant {
            next.claimant = claimant.trim().to_string();
        }
        if let Some(respondent) = &patch.respondent {
            next.respondent = respondent.trim().to_string();
        }
        if let Some(amount) = patch.claim_amount {
            next.claim_amount = amount;
        }
        if let Some(description) = &patch.description {
            next.description = Some(description.clone());
        }
        next.validate()?;

        let changes = vec![
            FieldChange::new("title", &self.title, &next.title),
            FieldChange::new("claimant", &self.claimant, &next.claimant),
            FieldChange::new("respondent", &self.respondent, &next.respondent),
            FieldChange::new("claim_amount", &self.claim_amount, &next.claim_amount),
            FieldChange::new("description", &self.description, &next.description),
        ];
        if changes.iter().any(FieldChange::is_change) {
            next.updated_at = now;
        }
        Ok((next, changes))
    }
}
