//! Threshold secret sharing.
//!
//! Shamir's scheme applied independently to every byte of the secret over
//! GF(2^8). A share is the point `(index, f(index))` for each byte
//! polynomial; indices run from 1 to `n`.

use super::gf256::Gf256;
use crate::{Error, Result};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// One fragment of a split secret
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Share {
    /// The x-coordinate (1..=255)
    #[zeroize(skip)]
    pub index: u8,

    /// One y-coordinate per secret byte
    #[serde(with = "crate::types::b64_bytes")]
    pub value: Vec<u8>,
}

impl Share {
    /// Create a share, rejecting the reserved index 0 and empty values
    pub fn new(index: u8, value: Vec<u8>) -> Result<Self> {
        if index == 0 {
            return Err(Error::Sharing("Share index 0 is reserved".into()));
        }
        if value.is_empty() {
            return Err(Error::Sharing("Empty share".into()));
        }
        Ok(Self { index, value })
    }
}

impl fmt::Debug for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Share")
            .field("index", &self.index)
            .field("length", &self.value.len())
            .field("value", &"***SENSITIVE***")
            .finish()
    }
}

/// Split `secret` into `share_count` shares, any `threshold` of which
/// reconstruct it
pub fn split(secret: &[u8], threshold: usize, share_count: usize) -> Result<Vec<Share>> {
    if secret.is_empty() {
        return Err(Error::Sharing("Cannot split an empty secret".into()));
    }
    if threshold < 1 || threshold > share_count {
        return Err(Error::Sharing(format!(
            "Invalid threshold {} for {} shares",
            threshold, share_count
        )));
    }
    if share_count > u8::MAX as usize {
        return Err(Error::Sharing(format!(
            "At most {} shares are supported",
            u8::MAX
        )));
    }

    let mut values: Vec<Vec<u8>> = (0..share_count)
        .map(|_| Vec::with_capacity(secret.len()))
        .collect();

    let mut coefficients = Zeroizing::new(vec![Gf256::ZERO; threshold]);
    let mut random = Zeroizing::new(vec![0u8; threshold - 1]);

    for &byte in secret {
        OsRng.fill_bytes(&mut random);
        coefficients[0] = Gf256(byte);
        for (coefficient, &r) in coefficients[1..].iter_mut().zip(random.iter()) {
            *coefficient = Gf256(r);
        }

        for (i, value) in values.iter_mut().enumerate() {
            let x = Gf256((i + 1) as u8);
            value.push(evaluate(&coefficients, x).0);
        }
    }

    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| Share::new((i + 1) as u8, value))
        .collect()
}

/// Reconstruct a secret from shares of a single split.
///
/// Correct only when at least `threshold` shares are supplied; fewer yield
/// an unrelated byte string.
pub fn combine(shares: &[Share]) -> Result<Zeroizing<Vec<u8>>> {
    let first = shares
        .first()
        .ok_or_else(|| Error::Sharing("No shares to combine".into()))?;
    let length = first.value.len();

    let mut seen = HashSet::with_capacity(shares.len());
    for share in shares {
        if share.index == 0 {
            return Err(Error::Sharing("Share index 0 is reserved".into()));
        }
        if share.value.len() != length {
            return Err(Error::Sharing("Share length mismatch".into()));
        }
        if !seen.insert(share.index) {
            return Err(Error::Sharing(format!(
                "Duplicate share index {}",
                share.index
            )));
        }
    }

    // Lagrange basis at x = 0; subtraction is addition in GF(2^8)
    let lambdas: Vec<Gf256> = shares
        .iter()
        .map(|share_j| {
            let xj = Gf256(share_j.index);
            let mut numerator = Gf256::ONE;
            let mut denominator = Gf256::ONE;
            for share_m in shares.iter().filter(|s| s.index != share_j.index) {
                let xm = Gf256(share_m.index);
                numerator *= xm;
                denominator *= xm + xj;
            }
            numerator * denominator.inv()
        })
        .collect();

    let mut secret = Zeroizing::new(Vec::with_capacity(length));
    for position in 0..length {
        let mut sum = Gf256::ZERO;
        for (share, lambda) in shares.iter().zip(&lambdas) {
            sum += Gf256(share.value[position]) * *lambda;
        }
        secret.push(sum.0);
    }

    Ok(secret)
}

/// Horner evaluation of `coefficients[0] + coefficients[1] x + ...`
fn evaluate(coefficients: &[Gf256], x: Gf256) -> Gf256 {
    coefficients
        .iter()
        .rev()
        .fold(Gf256::ZERO, |acc, &coefficient| acc * x + coefficient)
}
