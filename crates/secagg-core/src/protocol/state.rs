//! Round state chain.
//!
//! Every record holds everything the previous one held plus the data its
//! round added. Constructors copy fields forward from the predecessor, so a
//! record can only be built from the record of the round before it.

use super::status::SecureAggregationStatus;
use crate::crypto::{GeneratedKeyPairs, KeyPair};
use crate::{AbortReason, Configuration, EncryptedShare, PublicKeysOfUser, UserId};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct LoginState {
    pub own_id: UserId,
}

#[derive(Debug, Clone)]
pub struct SetupState {
    pub own_id: UserId,
    pub config: Configuration,
}

impl SetupState {
    pub fn new(previous: &LoginState, config: Configuration) -> Self {
        Self {
            own_id: previous.own_id,
            config,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Round0State {
    pub own_id: UserId,
    pub config: Configuration,
    pub key_pairs: GeneratedKeyPairs,
}

impl Round0State {
    pub fn new(previous: &SetupState, key_pairs: GeneratedKeyPairs) -> Self {
        Self {
            own_id: previous.own_id,
            config: previous.config.clone(),
            key_pairs,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Round0FinishedState {
    pub own_id: UserId,
    pub config: Configuration,
    pub key_pairs: GeneratedKeyPairs,
    /// Key records of every other user (U1)
    pub other_user_public_keys: Vec<PublicKeysOfUser>,
}

impl Round0FinishedState {
    pub fn new(previous: &Round0State, other_user_public_keys: Vec<PublicKeysOfUser>) -> Self {
        Self {
            own_id: previous.own_id,
            config: previous.config.clone(),
            key_pairs: previous.key_pairs.clone(),
            other_user_public_keys,
        }
    }

    pub fn u1(&self) -> BTreeSet<UserId> {
        self.other_user_public_keys.iter().map(|k| k.user_id).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Round1State {
    pub own_id: UserId,
    pub config: Configuration,
    pub key_pairs: GeneratedKeyPairs,
    pub other_user_public_keys: Vec<PublicKeysOfUser>,
    /// Ephemeral mask key
    pub b_u: KeyPair,
}

impl Round1State {
    pub fn new(previous: &Round0FinishedState, b_u: KeyPair) -> Self {
        Self {
            own_id: previous.own_id,
            config: previous.config.clone(),
            key_pairs: previous.key_pairs.clone(),
            other_user_public_keys: previous.other_user_public_keys.clone(),
            b_u,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Round1FinishedState {
    pub own_id: UserId,
    pub config: Configuration,
    pub key_pairs: GeneratedKeyPairs,
    pub other_user_public_keys: Vec<PublicKeysOfUser>,
    pub b_u: KeyPair,
    /// Envelopes addressed to this user; their senders form U2
    pub encrypted_shares_for_me: Vec<EncryptedShare>,
}

impl Round1FinishedState {
    pub fn new(previous: &Round1State, encrypted_shares_for_me: Vec<EncryptedShare>) -> Self {
        Self {
            own_id: previous.own_id,
            config: previous.config.clone(),
            key_pairs: previous.key_pairs.clone(),
            other_user_public_keys: previous.other_user_public_keys.clone(),
            b_u: previous.b_u.clone(),
            encrypted_shares_for_me,
        }
    }

    pub fn u2(&self) -> BTreeSet<UserId> {
        senders(&self.encrypted_shares_for_me)
    }
}

#[derive(Debug, Clone)]
pub struct Round2State {
    pub own_id: UserId,
    pub config: Configuration,
    pub key_pairs: GeneratedKeyPairs,
    pub other_user_public_keys: Vec<PublicKeysOfUser>,
    pub b_u: KeyPair,
    pub encrypted_shares_for_me: Vec<EncryptedShare>,
}

impl Round2State {
    pub fn new(previous: &Round1FinishedState) -> Self {
        Self {
            own_id: previous.own_id,
            config: previous.config.clone(),
            key_pairs: previous.key_pairs.clone(),
            other_user_public_keys: previous.other_user_public_keys.clone(),
            b_u: previous.b_u.clone(),
            encrypted_shares_for_me: previous.encrypted_shares_for_me.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Round2FinishedState {
    pub own_id: UserId,
    pub config: Configuration,
    pub key_pairs: GeneratedKeyPairs,
    pub other_user_public_keys: Vec<PublicKeysOfUser>,
    pub b_u: KeyPair,
    pub encrypted_shares_for_me: Vec<EncryptedShare>,
    /// Other users whose masked value reached the server (U3)
    pub remaining_users: Vec<UserId>,
}

impl Round2FinishedState {
    pub fn new(previous: &Round2State, remaining_users: Vec<UserId>) -> Self {
        Self {
            own_id: previous.own_id,
            config: previous.config.clone(),
            key_pairs: previous.key_pairs.clone(),
            other_user_public_keys: previous.other_user_public_keys.clone(),
            b_u: previous.b_u.clone(),
            encrypted_shares_for_me: previous.encrypted_shares_for_me.clone(),
            remaining_users,
        }
    }

    pub fn u2(&self) -> BTreeSet<UserId> {
        senders(&self.encrypted_shares_for_me)
    }

    pub fn u3(&self) -> BTreeSet<UserId> {
        self.remaining_users.iter().copied().collect()
    }
}

#[derive(Debug, Clone)]
pub struct Round4State {
    pub own_id: UserId,
    pub config: Configuration,
    pub key_pairs: GeneratedKeyPairs,
    pub other_user_public_keys: Vec<PublicKeysOfUser>,
    pub b_u: KeyPair,
    pub encrypted_shares_for_me: Vec<EncryptedShare>,
    pub remaining_users: Vec<UserId>,
}

impl Round4State {
    pub fn new(previous: &Round2FinishedState) -> Self {
        Self {
            own_id: previous.own_id,
            config: previous.config.clone(),
            key_pairs: previous.key_pairs.clone(),
            other_user_public_keys: previous.other_user_public_keys.clone(),
            b_u: previous.b_u.clone(),
            encrypted_shares_for_me: previous.encrypted_shares_for_me.clone(),
            remaining_users: previous.remaining_users.clone(),
        }
    }
}

fn senders(shares: &[EncryptedShare]) -> BTreeSet<UserId> {
    shares.iter().map(|share| share.u).collect()
}

/// The single cell of protocol knowledge for one session
#[derive(Debug, Clone)]
pub enum RoundState<V> {
    Waiting,
    Login(LoginState),
    Setup(SetupState),
    Round0(Round0State),
    Round0Finished(Round0FinishedState),
    Round1(Round1State),
    Round1Finished(Round1FinishedState),
    Round2(Round2State),
    Round2Finished(Round2FinishedState),
    Round4(Round4State),
    Finished(V),
    Aborted(AbortReason),
}

impl<V: Clone> RoundState<V> {
    /// Project onto the observable status
    pub fn status(&self) -> SecureAggregationStatus<V> {
        match self {
            RoundState::Waiting => SecureAggregationStatus::Waiting,
            RoundState::Login(_) => SecureAggregationStatus::Login,
            RoundState::Setup(_) => SecureAggregationStatus::Setup,
            RoundState::Round0(_) => SecureAggregationStatus::Round0,
            RoundState::Round0Finished(_) => SecureAggregationStatus::Round0Finished,
            RoundState::Round1(_) => SecureAggregationStatus::Round1,
            RoundState::Round1Finished(_) => SecureAggregationStatus::Round1Finished,
            RoundState::Round2(_) => SecureAggregationStatus::Round2,
            RoundState::Round2Finished(_) => SecureAggregationStatus::Round2Finished,
            RoundState::Round4(_) => SecureAggregationStatus::Round4,
            RoundState::Finished(value) => SecureAggregationStatus::Finished(value.clone()),
            RoundState::Aborted(reason) => SecureAggregationStatus::Aborted(reason.clone()),
        }
    }

    /// Identifier assigned at login, if already known
    pub fn own_id(&self) -> Option<UserId> {
        match self {
            RoundState::Login(s) => Some(s.own_id),
            RoundState::Setup(s) => Some(s.own_id),
            RoundState::Round0(s) => Some(s.own_id),
            RoundState::Round0Finished(s) => Some(s.own_id),
            RoundState::Round1(s) => Some(s.own_id),
            RoundState::Round1Finished(s) => Some(s.own_id),
            RoundState::Round2(s) => Some(s.own_id),
            RoundState::Round2Finished(s) => Some(s.own_id),
            RoundState::Round4(s) => Some(s.own_id),
            RoundState::Waiting | RoundState::Finished(_) | RoundState::Aborted(_) => None,
        }
    }
}
