use thiserror::Error;

use lexdesk_history::HistoryError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("application not found")]
    NotFound,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unknown status '{0}'")]
    UnknownStatus(String),

    /// The timeline append failed; the state change was not applied.
    #[error(transparent)]
    Timeline(#[from] HistoryError),
}
