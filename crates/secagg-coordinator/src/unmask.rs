//! Recovering the aggregate from masked inputs and revealed shares

use secagg_core::crypto::{combine, KeyPair, Share};
use secagg_core::{
    AbortReason, AggregateValue, Configuration, EncryptedShare, PublicKeysOfUser,
    Round4ClientData, UserId,
};
use std::collections::BTreeMap;

/// Sum the masked inputs of U3 and strip every mask.
///
/// For each survivor `u` the self-mask is rebuilt from `b_u`. For each user
/// that shared keys in round 1 but sent no masked input, `s_u` is rebuilt
/// and the pairwise masks the survivors added for it are removed.
pub(crate) fn unmask<V: AggregateValue>(
    config: &Configuration,
    keys: &BTreeMap<UserId, PublicKeysOfUser>,
    routed: &BTreeMap<UserId, Vec<EncryptedShare>>,
    masked: &BTreeMap<UserId, V>,
    revealed: &BTreeMap<UserId, Round4ClientData>,
) -> Result<V, AbortReason> {
    let modulus = config.modulus;

    let mut b_shares: BTreeMap<UserId, Vec<Share>> = BTreeMap::new();
    let mut s_shares: BTreeMap<UserId, Vec<Share>> = BTreeMap::new();
    for message in revealed.values() {
        for addressed in &message.b_uv {
            b_shares
                .entry(addressed.origin)
                .or_default()
                .push(addressed.share.clone());
        }
        for addressed in &message.s_uv {
            s_shares
                .entry(addressed.origin)
                .or_default()
                .push(addressed.share.clone());
        }
    }

    let mut total = V::zero();
    for (&u, value) in masked {
        total = total.add(value, modulus);

        let b_u = recover(&b_shares, u, config.threshold)?;
        let seed = b_u.self_agree().map_err(|e| violation(u, e))?;
        total = total.add(&V::mask(&seed, modulus).negate(modulus), modulus);
    }

    for (&u, sent) in routed.iter().filter(|(u, _)| !masked.contains_key(*u)) {
        let s_u = recover(&s_shares, u, config.threshold)?;
        if keys.get(&u).map(|k| k.s_public_key) != Some(s_u.public_key()) {
            return Err(AbortReason::SecurityViolation(format!(
                "Recovered key of user {} does not match its round 0 key",
                u
            )));
        }

        for share in sent.iter().filter(|share| masked.contains_key(&share.v)) {
            let v = share.v;
            let s_v = keys
                .get(&v)
                .ok_or(AbortReason::UnexpectedUserInProtocol)?
                .s_public_key;
            let seed = s_u.agree(&s_v).map_err(|e| violation(v, e))?;
            let mask = V::mask(&seed, modulus).cancelling(v, u, modulus);
            total = total.add(&mask.negate(modulus), modulus);
        }
    }

    Ok(total)
}

/// Rebuild the key pair of `origin` from at least `threshold` shares
fn recover(
    shares: &BTreeMap<UserId, Vec<Share>>,
    origin: UserId,
    threshold: usize,
) -> Result<KeyPair, AbortReason> {
    let shares = shares.get(&origin).map(Vec::as_slice).unwrap_or(&[]);
    if shares.len() < threshold {
        return Err(AbortReason::ThresholdUndercut);
    }

    let secret = combine(shares).map_err(|e| violation(origin, e))?;
    KeyPair::from_secret_slice(&secret).map_err(|e| violation(origin, e))
}

fn violation(user: UserId, e: secagg_core::Error) -> AbortReason {
    AbortReason::SecurityViolation(format!("Key material of user {}: {}", user, e))
}
