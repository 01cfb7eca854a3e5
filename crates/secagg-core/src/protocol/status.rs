//! Externally observable session status

use crate::AbortReason;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reduced view of the round state.
///
/// Carries the phase tag, the aggregate once finished and the abort reason
/// once aborted. Never carries keys or shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecureAggregationStatus<V> {
    Waiting,
    Login,
    Setup,
    Round0,
    Round0Finished,
    Round1,
    Round1Finished,
    Round2,
    Round2Finished,
    Round4,
    Finished(V),
    Aborted(AbortReason),
}

impl<V> SecureAggregationStatus<V> {
    /// Phase tag
    pub fn name(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Login => "login",
            Self::Setup => "setup",
            Self::Round0 => "round0",
            Self::Round0Finished => "round0Finished",
            Self::Round1 => "round1",
            Self::Round1Finished => "round1Finished",
            Self::Round2 => "round2",
            Self::Round2Finished => "round2Finished",
            Self::Round4 => "round4",
            Self::Finished(_) => "finished",
            Self::Aborted(_) => "aborted",
        }
    }

    /// Whether no further round call can succeed
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished(_) | Self::Aborted(_))
    }
}

impl<V: fmt::Display> fmt::Display for SecureAggregationStatus<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finished(value) => write!(f, "finished ({})", value),
            Self::Aborted(reason) => write!(f, "aborted ({})", reason),
            other => f.write_str(other.name()),
        }
    }
}
