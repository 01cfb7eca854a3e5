//! Aggregatable values

use crate::crypto::SharedSecret;
use crate::UserId;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Domain tag for expanding an agreement into a mask seed
const MASK_DOMAIN: &[u8] = b"secagg mask seed v1";

/// A value the protocol can sum.
///
/// Addition must be commutative and associative modulo `modulus`, and
/// `mask` must be a deterministic function of the seed so that both
/// sides of a key agreement expand it to the same value.
pub trait AggregateValue:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Additive identity
    fn zero() -> Self;

    /// Modular addition
    fn add(&self, other: &Self, modulus: u64) -> Self;

    /// Additive inverse modulo `modulus`
    fn negate(&self, modulus: u64) -> Self;

    /// Expand a shared secret into a pseudorandom value in `[0, modulus)`
    fn mask(seed: &SharedSecret, modulus: u64) -> Self;

    /// Negate if `own_id > other_id`.
    ///
    /// Both ends of a pair derive the same mask; exactly one of them
    /// negates it, so their contributions cancel in the sum.
    fn cancelling(self, own_id: UserId, other_id: UserId, modulus: u64) -> Self {
        if own_id > other_id {
            self.negate(modulus)
        } else {
            self
        }
    }
}

/// Integer residue modulo the session modulus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaInt(pub u64);

impl fmt::Display for SaInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AggregateValue for SaInt {
    fn zero() -> Self {
        SaInt(0)
    }

    fn add(&self, other: &Self, modulus: u64) -> Self {
        let sum = (self.0 as u128 + other.0 as u128) % modulus as u128;
        SaInt(sum as u64)
    }

    fn negate(&self, modulus: u64) -> Self {
        let reduced = self.0 % modulus;
        if reduced == 0 {
            SaInt(0)
        } else {
            SaInt(modulus - reduced)
        }
    }

    fn mask(seed: &SharedSecret, modulus: u64) -> Self {
        let mut rng = ChaCha20Rng::from_seed(mask_seed(seed));
        SaInt(rng.gen_range(0..modulus))
    }
}

/// Derive the 32-byte RNG seed behind a mask
pub fn mask_seed(seed: &SharedSecret) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(MASK_DOMAIN);
    hasher.update(seed.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    const MODULUS: u64 = 1000;

    #[test]
    fn test_add_wraps() {
        assert_eq!(SaInt(999).add(&SaInt(2), MODULUS), SaInt(1));
        assert_eq!(SaInt(0).add(&SaInt(0), MODULUS), SaInt(0));

        let big = u64::MAX - 1;
        assert_eq!(SaInt(big).add(&SaInt(big), u64::MAX), SaInt(u64::MAX - 2));
    }

    #[test]
    fn test_negate() {
        assert_eq!(SaInt(1).negate(MODULUS), SaInt(999));
        assert_eq!(SaInt(0).negate(MODULUS), SaInt(0));
        assert_eq!(SaInt(7).add(&SaInt(7).negate(MODULUS), MODULUS), SaInt::zero());
    }

    #[test]
    fn test_mask_in_range_and_deterministic() {
        let pair = KeyPair::generate();
        let secret = pair.self_agree().unwrap();

        let first = SaInt::mask(&secret, MODULUS);
        let second = SaInt::mask(&secret, MODULUS);

        assert_eq!(first, second);
        assert!(first.0 < MODULUS);
    }

    #[test]
    fn test_pairwise_masks_cancel() {
        let u = KeyPair::generate();
        let v = KeyPair::generate();
        let (u_id, v_id) = (3, 8);

        let from_u = SaInt::mask(&u.agree(&v.public_key()).unwrap(), MODULUS)
            .cancelling(u_id, v_id, MODULUS);
        let from_v = SaInt::mask(&v.agree(&u.public_key()).unwrap(), MODULUS)
            .cancelling(v_id, u_id, MODULUS);

        assert_eq!(from_u.add(&from_v, MODULUS), SaInt::zero());
    }

    #[test]
    fn test_cancelling_only_negates_higher_id() {
        assert_eq!(SaInt(5).cancelling(1, 2, MODULUS), SaInt(5));
        assert_eq!(SaInt(5).cancelling(2, 1, MODULUS), SaInt(995));
    }
}
