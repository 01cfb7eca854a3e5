//! # SecAgg Core
//!
//! Client-side engine for Bonawitz-style secure aggregation.
//!
//! Each participant holds one private value; a coordinating server learns
//! only the sum of all values and tolerates dropouts down to a threshold
//! of surviving participants.
//!
//! This crate provides:
//! - The aggregatable value abstraction
//! - Key agreement, key derivation and share envelopes
//! - Threshold secret sharing of ephemeral key material
//! - The round state chain and the protocol engine (`Participant`)
//! - The transport boundary and a session driver
//!
//! ## Protocol Overview
//!
//! The protocol runs login, setup and rounds 0, 1, 2 and 4 in strict
//! order. Round 3 (consistency checks) is not part of this protocol shape.
//!
//! ## Example
//!
//! ```rust,ignore
//! use secagg_core::{run_session, Participant, SaInt};
//!
//! let mut participant = Participant::new(SaInt(42));
//! let sum = run_session(&mut participant, &transport).await?;
//! ```

pub mod crypto;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod types;
pub mod value;

pub use error::{AbortReason, Error, Result};
pub use protocol::{
    run_session, LoginData, Participant, RoundState, Round0ServerData, Round1ClientData,
    Round1ServerData, Round2ClientData, Round2ServerData, Round4ClientData, Round4ServerData,
    SecureAggregationStatus, Submission,
};
pub use transport::Transport;
pub use types::{
    AddressedShare, Configuration, EncryptedShare, PublicKeyBytes, PublicKeysOfUser,
    SharesWrapper, UserId, MAX_USERS,
};
pub use value::{AggregateValue, SaInt};

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default threshold for a small session
pub const DEFAULT_THRESHOLD: usize = 2;

/// Default number of users
pub const DEFAULT_USERS: usize = 3;

/// Default modulus for integer aggregation
pub const DEFAULT_MODULUS: u64 = 1 << 32;
