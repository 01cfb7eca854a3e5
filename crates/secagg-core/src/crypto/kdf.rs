//! HKDF-SHA256 (RFC 5869)

use super::{SharedSecret, SymmetricKey};
use crate::{Error, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

const HASH_LEN: usize = 32;

/// Info string binding derived keys to share envelopes
pub const SHARE_ENVELOPE_INFO: &[u8] = b"secagg share envelope v1";

/// Extract-then-expand `length` bytes from `ikm`
pub fn hkdf_sha256(
    ikm: &[u8],
    salt: &[u8],
    info: &[u8],
    length: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    if length > 255 * HASH_LEN {
        return Err(Error::Crypto("HKDF output too long".into()));
    }

    // An empty salt is equivalent to HashLen zero bytes
    let mut extract = HmacSha256::new_from_slice(salt)
        .map_err(|e| Error::Crypto(e.to_string()))?;
    extract.update(ikm);
    let mut prk = Zeroizing::new([0u8; HASH_LEN]);
    prk.copy_from_slice(&extract.finalize().into_bytes());

    let mut okm = Zeroizing::new(Vec::with_capacity(length));
    let mut previous: Zeroizing<Vec<u8>> = Zeroizing::new(Vec::new());
    let mut counter = 1u8;

    while okm.len() < length {
        let mut expand =
            HmacSha256::new_from_slice(&prk[..]).map_err(|e| Error::Crypto(e.to_string()))?;
        expand.update(&previous[..]);
        expand.update(info);
        expand.update(&[counter]);
        let block = expand.finalize().into_bytes();

        let take = (length - okm.len()).min(HASH_LEN);
        okm.extend_from_slice(&block[..take]);
        previous.clear();
        previous.extend_from_slice(&block);
        counter = counter.wrapping_add(1);
    }

    Ok(okm)
}

/// Derive the symmetric key two peers share after agreeing on `shared_secret`
pub fn derive_key(shared_secret: &SharedSecret, salt: &[u8], info: &[u8]) -> Result<SymmetricKey> {
    let okm = hkdf_sha256(shared_secret.as_bytes(), salt, info, SymmetricKey::LEN)?;
    SymmetricKey::from_slice(&okm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    // RFC 5869, test case 1
    #[test]
    fn test_rfc5869_case_1() {
        let ikm = [0x0bu8; 22];
        let salt = hex::decode("000102030405060708090a0b0c").unwrap();
        let info = hex::decode("f0f1f2f3f4f5f6f7f8f9").unwrap();

        let okm = hkdf_sha256(&ikm, &salt, &info, 42).unwrap();

        assert_eq!(
            hex::encode(&*okm),
            "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865"
        );
    }

    // RFC 5869, test case 3 (empty salt and info)
    #[test]
    fn test_rfc5869_case_3() {
        let ikm = [0x0bu8; 22];

        let okm = hkdf_sha256(&ikm, &[], &[], 42).unwrap();

        assert_eq!(
            hex::encode(&*okm),
            "8da4e775a563c18f715f802a063c5a31b8a11f5c5ee1879ec3454e5f3c738d2d9d201395faa4b61a96c8"
        );
    }

    #[test]
    fn test_derive_key_matches_for_both_peers() {
        let u = KeyPair::generate();
        let v = KeyPair::generate();
        let salt = b"session salt";

        let k_uv = derive_key(&u.agree(&v.public_key()).unwrap(), salt, SHARE_ENVELOPE_INFO).unwrap();
        let k_vu = derive_key(&v.agree(&u.public_key()).unwrap(), salt, SHARE_ENVELOPE_INFO).unwrap();

        assert_eq!(k_uv.as_bytes(), k_vu.as_bytes());

        let other_salt =
            derive_key(&u.agree(&v.public_key()).unwrap(), b"other", SHARE_ENVELOPE_INFO).unwrap();
        assert_ne!(k_uv.as_bytes(), other_salt.as_bytes());
    }

    #[test]
    fn test_output_length_limit() {
        assert!(hkdf_sha256(b"ikm", b"", b"", 255 * 32 + 1).is_err());
    }
}
