use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// The backing store could not persist or load rows.
    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("invalid event: {0}")]
    Invalid(String),
}

impl HistoryError {
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }
}
