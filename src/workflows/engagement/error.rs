use super::repository::RepositoryError;

/// Failure taxonomy for engagement operations. Every variant is a
/// synchronous, caller-recoverable outcome; nothing here is retried.
#[derive(Debug, thiserror::Error)]
pub enum EngagementError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("{entity} may not move from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: &'static str,
        to: &'static str,
    },
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("amendment has already been reviewed")]
    AlreadyReviewed,
    #[error("stage is already completed")]
    AlreadyCompleted,
    #[error("prerequisite not met: {0}")]
    PrerequisiteNotMet(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl EngagementError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState(reason.into())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }
}
