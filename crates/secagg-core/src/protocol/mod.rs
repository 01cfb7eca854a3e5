//! Secure aggregation protocol engine
//!
//! `Participant` drives one user through login, setup and rounds 0, 1, 2
//! and 4. Each round has one entry point producing the message for the
//! server and one consuming the server's answer. Every entry point checks
//! that the state chain holds its exact predecessor; a mismatch fails with
//! `IncorrectStateForMethod` and leaves the chain untouched.
//!
//! A failed protocol check moves the chain to `Aborted` and returns
//! `ProtocolAborted`. Other failures (crypto, encoding) are returned
//! without touching the chain.

mod messages;
mod session;
mod state;
mod status;

pub use messages::*;
pub use session::run_session;
pub use state::*;
pub use status::SecureAggregationStatus;

use crate::crypto::{
    derive_key, kdf::SHARE_ENVELOPE_INFO, open, seal, split, GeneratedKeyPairs, KeyPair,
    SymmetricKey,
};
use crate::{
    AbortReason, AddressedShare, AggregateValue, Configuration, EncryptedShare, Error,
    PublicKeyBytes, PublicKeysOfUser, Result, SharesWrapper, UserId,
};
use std::collections::{btree_map::Entry, BTreeMap, BTreeSet, HashSet};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// One user's side of a secure aggregation session
pub struct Participant<V: AggregateValue> {
    value: V,
    state: RoundState<V>,
    status: watch::Sender<SecureAggregationStatus<V>>,
}

impl<V: AggregateValue> Participant<V> {
    /// Create a participant contributing `value`
    pub fn new(value: V) -> Self {
        let (status, _) = watch::channel(SecureAggregationStatus::Waiting);
        Self {
            value,
            state: RoundState::Waiting,
            status,
        }
    }

    /// Current round state
    pub fn state(&self) -> &RoundState<V> {
        &self.state
    }

    /// Current status projection
    pub fn status(&self) -> SecureAggregationStatus<V> {
        self.state.status()
    }

    /// Receive every status change from now on
    pub fn subscribe(&self) -> watch::Receiver<SecureAggregationStatus<V>> {
        self.status.subscribe()
    }

    /// Identifier assigned at login; needed to request round 1 data
    pub fn own_id(&self) -> Option<UserId> {
        self.state.own_id()
    }

    // ---- Login / Setup ----

    /// Record the identifier the server assigned
    pub fn save_login_data(&mut self, user_id: UserId) -> Result<()> {
        self.transition(|state, _| {
            let RoundState::Waiting = state else {
                return Err(Error::IncorrectStateForMethod);
            };
            Ok((RoundState::Login(LoginState { own_id: user_id }), ()))
        })
    }

    /// Record the session configuration
    pub fn save_setup_data(&mut self, config: Configuration) -> Result<()> {
        self.transition(|state, _| {
            let RoundState::Login(current) = state else {
                return Err(Error::IncorrectStateForMethod);
            };
            config.validate()?;
            Ok((RoundState::Setup(SetupState::new(current, config)), ()))
        })
    }

    // ---- Round 0: key generation ----

    /// Generate both key pairs and return the public halves for broadcast
    pub fn round0(&mut self) -> Result<PublicKeysOfUser> {
        self.transition(|state, _| {
            let RoundState::Setup(current) = state else {
                return Err(Error::IncorrectStateForMethod);
            };

            let next = Round0State::new(current, GeneratedKeyPairs::generate());
            let message = PublicKeysOfUser {
                user_id: next.own_id,
                c_public_key: next.key_pairs.c.public_key(),
                s_public_key: next.key_pairs.s.public_key(),
            };

            info!(user_id = next.own_id, "Round 0: generated key pairs");
            Ok((RoundState::Round0(next), message))
        })
    }

    /// Store the key records of all other users (U1)
    pub fn process_round0_data(&mut self, data: Round0ServerData) -> Result<()> {
        self.transition(|state, _| {
            let RoundState::Round0(current) = state else {
                return Err(Error::IncorrectStateForMethod);
            };

            let others: Vec<PublicKeysOfUser> = data
                .collected_data
                .into_iter()
                .filter(|keys| keys.user_id != current.own_id)
                .collect();

            debug!(user_id = current.own_id, peers = others.len(), "Round 0 finished");
            Ok((
                RoundState::Round0Finished(Round0FinishedState::new(current, others)),
                (),
            ))
        })
    }

    // ---- Round 1: secret sharing ----

    /// Share `s_u` and a fresh `b_u` among U1 and seal one bundle per peer
    pub fn round1(&mut self) -> Result<Round1ClientData> {
        self.transition(|state, _| {
            let RoundState::Round0Finished(current) = state else {
                return Err(Error::IncorrectStateForMethod);
            };

            let peers = checked_peers(current)?;
            let threshold = current.config.threshold;
            let own_id = current.own_id;

            let b_u = KeyPair::generate();
            let s_shares = split(&*current.key_pairs.s.secret_bytes(), threshold, peers.len())?;
            let b_shares = split(&*b_u.secret_bytes(), threshold, peers.len())?;

            let mut encrypted_shares = Vec::with_capacity(peers.len());
            for ((peer, s_uv), b_uv) in peers.iter().zip(s_shares).zip(b_shares) {
                let key = envelope_key(
                    &current.key_pairs.c,
                    &peer.c_public_key,
                    &current.config.salt,
                    peer.user_id,
                )?;
                let wrapper = SharesWrapper {
                    u: own_id,
                    v: peer.user_id,
                    s_uv,
                    b_uv,
                };
                let plaintext = Zeroizing::new(serde_json::to_vec(&wrapper)?);

                encrypted_shares.push(EncryptedShare {
                    e_uv: seal(&plaintext, &key)?,
                    u: own_id,
                    v: peer.user_id,
                });
            }

            info!(
                user_id = own_id,
                shares = encrypted_shares.len(),
                threshold,
                "Round 1: sealed shares"
            );
            Ok((
                RoundState::Round1(Round1State::new(current, b_u)),
                Round1ClientData { encrypted_shares },
            ))
        })
    }

    /// Store the envelopes the server routed to this user (senders form U2)
    pub fn process_round1_data(&mut self, data: Round1ServerData) -> Result<()> {
        self.transition(|state, _| {
            let RoundState::Round1(current) = state else {
                return Err(Error::IncorrectStateForMethod);
            };

            let mut senders = HashSet::with_capacity(data.encrypted_shares_for_me.len());
            for share in &data.encrypted_shares_for_me {
                if share.v != current.own_id {
                    return Err(security_violation(format!(
                        "Share from user {} for user {} was routed to user {}",
                        share.u, share.v, current.own_id
                    )));
                }
                if !senders.insert(share.u) {
                    return Err(security_violation(format!(
                        "User {} sent more than one share",
                        share.u
                    )));
                }
            }

            debug!(
                user_id = current.own_id,
                received = senders.len(),
                "Round 1 finished"
            );
            Ok((
                RoundState::Round1Finished(Round1FinishedState::new(
                    current,
                    data.encrypted_shares_for_me,
                )),
                (),
            ))
        })
    }

    // ---- Round 2: masked input ----

    /// Mask the private value with the self-mask and all pairwise masks
    pub fn round2(&mut self) -> Result<Round2ClientData<V>> {
        self.transition(|state, value| {
            let RoundState::Round1Finished(current) = state else {
                return Err(Error::IncorrectStateForMethod);
            };

            let u2 = current.u2();
            if u2.len() < current.config.threshold {
                return Err(AbortReason::ThresholdUndercut.into());
            }

            let modulus = current.config.modulus;
            let own_id = current.own_id;

            let mut pairwise = V::zero();
            for &peer in &u2 {
                let keys = find_keys(&current.other_user_public_keys, peer)
                    .ok_or(Error::ProtocolAborted(AbortReason::UnexpectedUserInProtocol))?;
                let shared = current
                    .key_pairs
                    .s
                    .agree(&keys.s_public_key)
                    .map_err(|_| degenerate_key(peer))?;
                let mask = V::mask(&shared, modulus).cancelling(own_id, peer, modulus);
                pairwise = pairwise.add(&mask, modulus);
            }

            let self_mask = V::mask(&current.b_u.self_agree()?, modulus);
            let masked_value = value.add(&self_mask, modulus).add(&pairwise, modulus);

            info!(user_id = own_id, peers = u2.len(), "Round 2: masked input");
            Ok((
                RoundState::Round2(Round2State::new(current)),
                Round2ClientData {
                    masked_value,
                    origin: own_id,
                },
            ))
        })
    }

    /// Store the users whose masked value reached the server (U3)
    pub fn process_round2_data(&mut self, data: Round2ServerData) -> Result<()> {
        self.transition(|state, _| {
            let RoundState::Round2(current) = state else {
                return Err(Error::IncorrectStateForMethod);
            };

            let remaining: Vec<UserId> = data
                .remaining_users
                .into_iter()
                .filter(|&user| user != current.own_id)
                .collect();

            debug!(
                user_id = current.own_id,
                remaining = remaining.len(),
                "Round 2 finished"
            );
            Ok((
                RoundState::Round2Finished(Round2FinishedState::new(current, remaining)),
                (),
            ))
        })
    }

    // ---- Round 4: unmasking ----

    /// Open every received envelope and reveal the share the server needs:
    /// `b_uv` for senders still in U3, `s_uv` for senders in U2 \ U3
    pub fn round4(&mut self) -> Result<Round4ClientData> {
        self.transition(|state, _| {
            let RoundState::Round2Finished(current) = state else {
                return Err(Error::IncorrectStateForMethod);
            };

            let u2 = current.u2();
            let u3 = current.u3();
            if !u3.is_subset(&u2) {
                return Err(AbortReason::UnexpectedUserInProtocol.into());
            }
            if u3.len() < current.config.threshold {
                return Err(AbortReason::ThresholdUndercut.into());
            }
            let dropped: BTreeSet<UserId> = u2.difference(&u3).copied().collect();

            let mut message = Round4ClientData::default();
            for encrypted in &current.encrypted_shares_for_me {
                let wrapper = open_shares(current, encrypted)?;

                if u3.contains(&wrapper.u) {
                    message.b_uv.push(AddressedShare {
                        origin: wrapper.u,
                        destination: wrapper.v,
                        share: wrapper.b_uv.clone(),
                    });
                } else if dropped.contains(&wrapper.u) {
                    message.s_uv.push(AddressedShare {
                        origin: wrapper.u,
                        destination: wrapper.v,
                        share: wrapper.s_uv.clone(),
                    });
                }
            }

            info!(
                user_id = current.own_id,
                b_shares = message.b_uv.len(),
                s_shares = message.s_uv.len(),
                "Round 4: revealed shares"
            );
            Ok((RoundState::Round4(Round4State::new(current)), message))
        })
    }

    /// Store the aggregate and release all key material
    pub fn process_round4_data(&mut self, data: Round4ServerData<V>) -> Result<()> {
        self.transition(|state, _| {
            let RoundState::Round4(current) = state else {
                return Err(Error::IncorrectStateForMethod);
            };

            info!(user_id = current.own_id, "Aggregation finished");
            Ok((RoundState::Finished(data.value), ()))
        })
    }

    /// Run one state transition.
    ///
    /// `step` sees the current state and either returns the successor with
    /// the round's output, or fails. Protocol failures abort the session;
    /// anything else leaves the state as it was.
    fn transition<T, F>(&mut self, step: F) -> Result<T>
    where
        F: FnOnce(&RoundState<V>, &V) -> Result<(RoundState<V>, T)>,
    {
        match step(&self.state, &self.value) {
            Ok((next, output)) => {
                self.advance(next);
                Ok(output)
            }
            Err(Error::ProtocolAborted(reason)) => {
                warn!(own_id = ?self.state.own_id(), %reason, "Protocol aborted");
                self.advance(RoundState::Aborted(reason.clone()));
                Err(Error::ProtocolAborted(reason))
            }
            Err(e) => Err(e),
        }
    }

    fn advance(&mut self, next: RoundState<V>) {
        self.state = next;
        self.status.send_replace(self.state.status());
    }
}

impl<V: AggregateValue> std::fmt::Debug for Participant<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant")
            .field("state", &self.state.status().name())
            .field("value", &"***SENSITIVE***")
            .finish()
    }
}

/// Deduplicate U1 and run the round 1 checks: enough users, one key record
/// per user, no public key reused
fn checked_peers(current: &Round0FinishedState) -> Result<Vec<PublicKeysOfUser>> {
    if current.u1().len() < current.config.threshold {
        return Err(AbortReason::ThresholdUndercut.into());
    }

    let mut peers: BTreeMap<UserId, &PublicKeysOfUser> = BTreeMap::new();
    for keys in &current.other_user_public_keys {
        match peers.entry(keys.user_id) {
            Entry::Vacant(entry) => {
                entry.insert(keys);
            }
            Entry::Occupied(entry) if *entry.get() != keys => {
                return Err(security_violation(format!(
                    "Conflicting public keys for user {}",
                    keys.user_id
                )));
            }
            Entry::Occupied(_) => {}
        }
    }

    let mut c_keys: HashSet<PublicKeyBytes> = HashSet::new();
    let mut s_keys: HashSet<PublicKeyBytes> = HashSet::new();
    c_keys.insert(current.key_pairs.c.public_key());
    s_keys.insert(current.key_pairs.s.public_key());
    for keys in peers.values() {
        if !c_keys.insert(keys.c_public_key) || !s_keys.insert(keys.s_public_key) {
            return Err(security_violation(
                "Public keys from round 0 were not distinct".into(),
            ));
        }
    }

    Ok(peers.into_values().cloned().collect())
}

/// Symmetric key for envelopes between this user and `peer`
fn envelope_key(
    own: &KeyPair,
    peer_key: &PublicKeyBytes,
    salt: &[u8],
    peer: UserId,
) -> Result<SymmetricKey> {
    let shared = own.agree(peer_key).map_err(|_| degenerate_key(peer))?;
    derive_key(&shared, salt, SHARE_ENVELOPE_INFO)
}

/// Decrypt one round 1 envelope and check its routing
fn open_shares(current: &Round2FinishedState, encrypted: &EncryptedShare) -> Result<SharesWrapper> {
    let keys = find_keys(&current.other_user_public_keys, encrypted.u)
        .ok_or(Error::ProtocolAborted(AbortReason::UnexpectedUserInProtocol))?;

    let key = envelope_key(
        &current.key_pairs.c,
        &keys.c_public_key,
        &current.config.salt,
        encrypted.u,
    )
    .map_err(|e| match e {
        Error::ProtocolAborted(_) => e,
        other => security_violation(other.to_string()),
    })?;

    let plaintext = Zeroizing::new(open(&encrypted.e_uv, &key).map_err(|_| {
        security_violation(format!("Shares from user {} failed to decrypt", encrypted.u))
    })?);
    let wrapper: SharesWrapper = serde_json::from_slice(&plaintext).map_err(|_| {
        security_violation(format!("Shares from user {} are malformed", encrypted.u))
    })?;

    if wrapper.u != encrypted.u || wrapper.v != encrypted.v {
        return Err(security_violation(
            "Decrypted shares carry wrong routing information".into(),
        ));
    }

    Ok(wrapper)
}

fn find_keys(keys: &[PublicKeysOfUser], user: UserId) -> Option<&PublicKeysOfUser> {
    keys.iter().find(|k| k.user_id == user)
}

fn security_violation(description: String) -> Error {
    Error::ProtocolAborted(AbortReason::SecurityViolation(description))
}

fn degenerate_key(peer: UserId) -> Error {
    security_violation(format!("Key agreement with user {} is degenerate", peer))
}
