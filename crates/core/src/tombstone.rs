//! Soft-deletion marker.
//!
//! Identity rows and audit rows are never physically removed by the core; they
//! carry a tombstone that every authorization, menu and listing path consults.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Tombstone {
    #[default]
    Live,
    Deleted { at: DateTime<Utc> },
}

impl Tombstone {
    pub fn deleted_now() -> Self {
        Self::Deleted { at: Utc::now() }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }

    pub fn is_deleted(&self) -> bool {
        !self.is_live()
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Live => None,
            Self::Deleted { at } => Some(*at),
        }
    }
}
