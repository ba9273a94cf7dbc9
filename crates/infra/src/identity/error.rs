use thiserror::Error;

use lexdesk_core::DomainError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("menu item cannot be placed under itself or one of its descendants")]
    MenuCycle,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("identity store unavailable: {0}")]
    Persistence(String),
}

impl From<DomainError> for IdentityError {
    fn from(err: DomainError) -> Self {
        Self::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_become_validation_failures() {
        let err = IdentityError::from(DomainError::validation("user name must not be empty"));
        assert_eq!(
            err,
            IdentityError::Validation("validation failed: user name must not be empty".to_string())
        );
    }
}
