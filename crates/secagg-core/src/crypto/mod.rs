//! Cryptographic building blocks
//!
//! This module provides the primitives the protocol engine composes:
//! - X25519 key pairs and key agreement
//! - HKDF-SHA256 key derivation
//! - ChaCha20-Poly1305 envelopes for routed shares
//! - Shamir secret sharing over GF(2^8)

pub mod envelope;
mod gf256;
pub mod kdf;
pub mod keys;
pub mod sharing;

pub use envelope::{open, seal, SealedBox, SymmetricKey};
pub use kdf::derive_key;
pub use keys::{GeneratedKeyPairs, KeyPair, SharedSecret};
pub use sharing::{combine, split, Share};
