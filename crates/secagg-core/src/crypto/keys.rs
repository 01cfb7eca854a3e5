//! X25519 key pairs

use crate::{Error, PublicKeyBytes, Result};
use rand::rngs::OsRng;
use std::fmt;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

/// An X25519 key pair.
///
/// The private scalar is kept as a `StaticSecret` so its raw bytes can be
/// split into shares; it is wiped when the pair is dropped.
#[derive(Clone)]
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a fresh key pair from the OS RNG
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Rebuild a key pair from raw private key bytes
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Rebuild a key pair from a recombined secret of unknown length
    pub fn from_secret_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::Crypto("Invalid private key length".into()))?;
        Ok(Self::from_secret_bytes(array))
    }

    /// Public key bytes
    pub fn public_key(&self) -> PublicKeyBytes {
        self.public.to_bytes()
    }

    /// Raw private key bytes, the input to secret sharing
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.secret.to_bytes())
    }

    /// X25519 agreement with a peer's public key.
    ///
    /// Fails if the peer key is a low-order point.
    pub fn agree(&self, peer: &PublicKeyBytes) -> Result<SharedSecret> {
        let shared = self.secret.diffie_hellman(&PublicKey::from(*peer));
        if !shared.was_contributory() {
            return Err(Error::Crypto("Non-contributory key agreement".into()));
        }
        Ok(SharedSecret(shared))
    }

    /// Agreement of the key pair with its own public key
    pub fn self_agree(&self) -> Result<SharedSecret> {
        self.agree(&self.public_key())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &hex::encode(self.public.as_bytes()))
            .field("secret", &"***SENSITIVE***")
            .finish()
    }
}

/// Output of a key agreement
pub struct SharedSecret(x25519_dalek::SharedSecret);

impl SharedSecret {
    /// Raw secret bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }
}

/// The two key pairs generated in round 0
#[derive(Debug, Clone)]
pub struct GeneratedKeyPairs {
    /// Encrypts shares sent to peers
    pub c: KeyPair,
    /// Agrees pairwise masks with peers
    pub s: KeyPair,
}

impl GeneratedKeyPairs {
    /// Generate both pairs independently
    pub fn generate() -> Self {
        Self {
            c: KeyPair::generate(),
            s: KeyPair::generate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agreement_is_symmetric() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();

        let ab = alice.agree(&bob.public_key()).unwrap();
        let ba = bob.agree(&alice.public_key()).unwrap();

        assert_eq!(ab.as_bytes(), ba.as_bytes());
    }

    #[test]
    fn test_rebuild_from_secret_bytes() {
        let original = KeyPair::generate();
        let rebuilt = KeyPair::from_secret_bytes(*original.secret_bytes());

        assert_eq!(original.public_key(), rebuilt.public_key());
        assert_eq!(
            original.self_agree().unwrap().as_bytes(),
            rebuilt.self_agree().unwrap().as_bytes()
        );
    }

    #[test]
    fn test_low_order_point_rejected() {
        let pair = KeyPair::generate();
        assert!(matches!(pair.agree(&[0u8; 32]), Err(Error::Crypto(_))));
    }

    #[test]
    fn test_debug_redaction() {
        let pair = KeyPair::generate();
        let debug_str = format!("{:?}", pair);
        assert!(debug_str.contains("***SENSITIVE***"));
        assert!(!debug_str.contains(&hex::encode(*pair.secret_bytes())));
    }

    #[test]
    fn test_secret_slice_length_checked() {
        assert!(KeyPair::from_secret_slice(&[1u8; 31]).is_err());
        assert!(KeyPair::from_secret_slice(&[1u8; 32]).is_ok());
    }
}
