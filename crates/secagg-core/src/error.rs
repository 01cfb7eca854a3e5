//! Error types for secure aggregation operations

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for secure aggregation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Reason a session was aborted.
///
/// Once a participant observes one of these, the session is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "reason", content = "description", rename_all = "camelCase")]
pub enum AbortReason {
    /// Fewer than `t` distinct participants remain
    #[error("fewer than t participants remain")]
    ThresholdUndercut,

    /// A participant showed up that an earlier round never saw
    #[error("unexpected user in protocol")]
    UnexpectedUserInProtocol,

    /// Integrity failure: duplicate keys, misrouted or undecryptable shares
    #[error("security violation: {0}")]
    SecurityViolation(String),
}

/// Errors that can occur during protocol execution
#[derive(Debug, Error)]
pub enum Error {
    /// A round method was called while the state chain held another variant
    #[error("Method called in incorrect state")]
    IncorrectStateForMethod,

    /// A protocol check failed and the session was aborted
    #[error("Protocol aborted: {0}")]
    ProtocolAborted(AbortReason),

    /// Invalid session configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Key agreement, key derivation or AEAD failure
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Secret sharing split/combine failure
    #[error("Secret sharing error: {0}")]
    Sharing(String),

    /// Network/transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Timeout waiting for the server
    #[error("Timeout waiting for {0}")]
    Timeout(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<AbortReason> for Error {
    fn from(reason: AbortReason) -> Self {
        Error::ProtocolAborted(reason)
    }
}
