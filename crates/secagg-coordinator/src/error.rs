//! Coordinator error types

use crate::Phase;
use secagg_core::AbortReason;
use thiserror::Error;

/// Coordinator error types
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The session has not reached the phase that serves this request
    #[error("Not ready: waiting for {0} to close")]
    NotReady(Phase),

    /// A submission was ineligible, duplicated or malformed
    #[error("Rejected: {0}")]
    Rejected(String),

    /// The session is over without a result
    #[error("Session aborted: {0}")]
    Aborted(AbortReason),

    /// Protocol core failure
    #[error(transparent)]
    Core(#[from] secagg_core::Error),
}

impl CoordinatorError {
    /// Whether the same request may succeed later
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoordinatorError::NotReady(_))
    }
}

impl From<CoordinatorError> for secagg_core::Error {
    fn from(e: CoordinatorError) -> Self {
        match e {
            CoordinatorError::Core(inner) => inner,
            CoordinatorError::NotReady(phase) => secagg_core::Error::Timeout(phase.to_string()),
            other => secagg_core::Error::Transport(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
