//! GF(2^8) arithmetic over the AES polynomial x^8 + x^4 + x^3 + x + 1.
//!
//! Multiplication is bit-serial with mask-based reduction, so no lookup
//! tables are indexed by secret bytes.

use std::ops::{Add, AddAssign, Mul, MulAssign};
use zeroize::Zeroize;

/// Low byte of the reduction polynomial (0x11B)
const POLY: u8 = 0x1B;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Zeroize)]
pub(crate) struct Gf256(pub u8);

impl Gf256 {
    pub const ZERO: Self = Gf256(0);
    pub const ONE: Self = Gf256(1);

    /// Multiplicative inverse as a^254. Maps zero to zero.
    pub fn inv(self) -> Self {
        // a^254 = a^(2+4+8+16+32+64+128)
        let mut result = Self::ONE;
        let mut square = self;
        for _ in 1..8 {
            square = square * square;
            result *= square;
        }
        result
    }
}

impl Add for Gf256 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Gf256(self.0 ^ rhs.0)
    }
}

impl AddAssign for Gf256 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Mul for Gf256 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let mut a = self.0;
        let mut b = rhs.0;
        let mut product = 0u8;

        for _ in 0..8 {
            // all-ones when the low bit of b is set
            let take = (b & 1).wrapping_neg();
            product ^= a & take;

            let carry = (a >> 7).wrapping_neg();
            a = (a << 1) ^ (POLY & carry);
            b >>= 1;
        }

        Gf256(product)
    }
}

impl MulAssign for Gf256 {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_products() {
        // FIPS-197 section 4.2 examples
        assert_eq!(Gf256(0x57) * Gf256(0x83), Gf256(0xc1));
        assert_eq!(Gf256(0x57) * Gf256(0x13), Gf256(0xfe));
    }

    #[test]
    fn test_inverse() {
        for value in 1..=255u8 {
            let a = Gf256(value);
            assert_eq!(a * a.inv(), Gf256::ONE, "inverse of {:#04x}", value);
        }
        assert_eq!(Gf256::ZERO.inv(), Gf256::ZERO);
    }

    #[test]
    fn test_addition_is_xor() {
        assert_eq!(Gf256(0x53) + Gf256(0xca), Gf256(0x99));
        assert_eq!(Gf256(0x42) + Gf256(0x42), Gf256::ZERO);
    }
}
