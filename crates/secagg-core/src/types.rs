//! Core types for the secure aggregation protocol

use crate::crypto::{SealedBox, Share};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Participant identifier, assigned by the server at login
pub type UserId = u64;

/// Raw X25519 public key bytes
pub type PublicKeyBytes = [u8; 32];

/// Largest session a one-byte share index can serve
pub const MAX_USERS: usize = 256;

/// Protocol parameters for one aggregation session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Number of users registered for the session
    pub number_of_users: usize,

    /// Threshold (t-of-n)
    pub threshold: usize,

    /// Modulus all values are reduced by
    pub modulus: u64,

    /// Salt for symmetric key derivation
    #[serde(with = "hex_bytes")]
    pub salt: Vec<u8>,
}

impl Configuration {
    /// Create a validated configuration
    pub fn new(
        number_of_users: usize,
        threshold: usize,
        modulus: u64,
        salt: Vec<u8>,
    ) -> Result<Self> {
        let config = Self {
            number_of_users,
            threshold,
            modulus,
            salt,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the parameters are usable for a session
    pub fn validate(&self) -> Result<()> {
        if self.threshold < 1 {
            return Err(Error::InvalidConfig("Threshold must be at least 1".into()));
        }
        // Each user holds shares from its peers only, so t must stay below n
        if self.threshold >= self.number_of_users {
            return Err(Error::InvalidConfig(
                "Threshold must be below the number of users".into(),
            ));
        }
        if self.number_of_users > MAX_USERS {
            return Err(Error::InvalidConfig(format!(
                "At most {} users are supported",
                MAX_USERS
            )));
        }
        if self.modulus < 2 {
            return Err(Error::InvalidConfig("Modulus must be at least 2".into()));
        }
        Ok(())
    }
}

/// Public keys broadcast by one user in round 0
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeysOfUser {
    /// Owner of the corresponding private keys
    pub user_id: UserId,
    /// Key used for share encryption
    #[serde(with = "hex_key")]
    pub c_public_key: PublicKeyBytes,
    /// Key used for pairwise mask agreement
    #[serde(with = "hex_key")]
    pub s_public_key: PublicKeyBytes,
}

/// Encrypted shares from user `u` to user `v`, routed through the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedShare {
    /// Sealed `SharesWrapper`
    pub e_uv: SealedBox,
    /// Sender
    pub u: UserId,
    /// Recipient
    pub v: UserId,
}

/// Plaintext of an `EncryptedShare`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharesWrapper {
    /// Sender
    pub u: UserId,
    /// Recipient
    pub v: UserId,
    /// Recipient's share of the sender's `s` private key
    pub s_uv: Share,
    /// Recipient's share of the sender's mask key `b_u`
    pub b_uv: Share,
}

/// A share revealed to the server in round 4
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressedShare {
    /// User whose secret was split
    pub origin: UserId,
    /// User that held this share
    pub destination: UserId,
    /// The share itself
    pub share: Share,
}

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod hex_key {
    use super::PublicKeyBytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(key: &PublicKeyBytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(key))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<PublicKeyBytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("Invalid public key length"))
    }
}

pub(crate) mod b64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}
