//! Authenticated encryption of routed share payloads

use crate::{Error, Result};
use aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// 256-bit symmetric key, wiped on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; 32]);

impl SymmetricKey {
    /// Key length in bytes
    pub const LEN: usize = 32;

    /// Build a key from exactly `LEN` bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::Crypto("Invalid symmetric key length".into()))?;
        Ok(Self(array))
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(***SENSITIVE***)")
    }
}

/// Sealed payload: nonce || ciphertext || tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealedBox(#[serde(with = "crate::types::b64_bytes")] Vec<u8>);

impl SealedBox {
    /// Wrap bytes received from the wire
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Combined representation
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[cfg(test)]
    pub(crate) fn as_mut_bytes(&mut self) -> &mut Vec<u8> {
        &mut self.0
    }
}

/// Encrypt and authenticate `plaintext` under `key` with a fresh random nonce
pub fn seal(plaintext: &[u8], key: &SymmetricKey) -> Result<SealedBox> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| Error::Crypto("Encryption failed".into()))?;

    let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    combined.extend_from_slice(&nonce);
    combined.extend_from_slice(&ciphertext);
    Ok(SealedBox(combined))
}

/// Verify and decrypt a sealed box
pub fn open(sealed: &SealedBox, key: &SymmetricKey) -> Result<Vec<u8>> {
    if sealed.0.len() < NONCE_LEN + TAG_LEN {
        return Err(Error::Crypto("Sealed box too short".into()));
    }
    let (nonce, ciphertext) = sealed.0.split_at(NONCE_LEN);

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| Error::Crypto("Authentication failed".into()))
}
