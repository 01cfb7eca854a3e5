//! Server-side session state

use crate::unmask::unmask;
use crate::{CoordinatorError, Result};
use secagg_core::{
    AbortReason, AggregateValue, Configuration, EncryptedShare, PublicKeysOfUser,
    Round0ServerData, Round1ClientData, Round1ServerData, Round2ClientData, Round2ServerData,
    Round4ClientData, Round4ServerData, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info, warn};

/// Collection phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Login,
    Round0,
    Round1,
    Round2,
    Round4,
    Finished,
    Aborted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Login => "login",
            Phase::Round0 => "round0",
            Phase::Round1 => "round1",
            Phase::Round2 => "round2",
            Phase::Round4 => "round4",
            Phase::Finished => "finished",
            Phase::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Public view of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "V: Deserialize<'de>"))]
pub struct CoordinatorStatus<V> {
    pub phase: Phase,
    pub registered_users: usize,
    pub threshold: usize,
    /// Submissions collected in the current phase
    pub submissions: usize,
    /// Users eligible to submit in the current phase
    pub eligible: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<AbortReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<V>,
}

/// Collects round messages, routes shares and unmasks the aggregate.
///
/// Eligibility narrows from phase to phase: registered users may submit
/// keys, users with keys (U1) may submit shares, users whose shares were
/// accepted (U2) may submit a masked value, and users whose masked value
/// was accepted (U3) may reveal shares.
pub struct Coordinator<V: AggregateValue> {
    config: Configuration,
    phase: Phase,
    users: Vec<UserId>,
    round0: BTreeMap<UserId, PublicKeysOfUser>,
    round1: BTreeMap<UserId, Vec<EncryptedShare>>,
    round2: BTreeMap<UserId, V>,
    round4: BTreeMap<UserId, Round4ClientData>,
    result: Option<V>,
    abort_reason: Option<AbortReason>,
}

impl<V: AggregateValue> Coordinator<V> {
    /// Open a session expecting `config.number_of_users` logins
    pub fn new(config: Configuration) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            phase: Phase::Login,
            users: Vec::new(),
            round0: BTreeMap::new(),
            round1: BTreeMap::new(),
            round2: BTreeMap::new(),
            round4: BTreeMap::new(),
            result: None,
            abort_reason: None,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> CoordinatorStatus<V> {
        CoordinatorStatus {
            phase: self.phase,
            registered_users: self.users.len(),
            threshold: self.config.threshold,
            submissions: self.submissions(),
            eligible: self.eligible(),
            abort_reason: self.abort_reason.clone(),
            result: self.result.clone(),
        }
    }

    // ---- Login / Setup ----

    /// Register a user; login closes once the expected number arrived
    pub fn login(&mut self) -> Result<UserId> {
        self.accepting(Phase::Login)?;

        let user_id = self.users.len() as UserId + 1;
        self.users.push(user_id);
        info!(user_id, registered = self.users.len(), "User logged in");

        self.close_if_complete();
        Ok(user_id)
    }

    /// Session configuration, sized to the users that actually logged in
    pub fn configuration(&self) -> Result<Configuration> {
        self.served_after(Phase::Login)?;
        Ok(self.config.clone())
    }

    // ---- Round 0 ----

    pub fn submit_round0(&mut self, user: UserId, keys: PublicKeysOfUser) -> Result<()> {
        self.accepting(Phase::Round0)?;
        if !self.users.contains(&user) {
            return Err(rejected(format!("User {} is not registered", user)));
        }
        if keys.user_id != user {
            return Err(rejected(format!(
                "Keys of user {} submitted by user {}",
                keys.user_id, user
            )));
        }
        if self.round0.contains_key(&user) {
            return Err(duplicate(user, Phase::Round0));
        }

        self.round0.insert(user, keys);
        debug!(user, collected = self.round0.len(), "Round 0 keys accepted");
        self.close_if_complete();
        Ok(())
    }

    pub fn round0_data(&self) -> Result<Round0ServerData> {
        self.served_after(Phase::Round0)?;
        Ok(Round0ServerData {
            collected_data: self.round0.values().cloned().collect(),
        })
    }

    // ---- Round 1 ----

    pub fn submit_round1(&mut self, user: UserId, data: Round1ClientData) -> Result<()> {
        self.accepting(Phase::Round1)?;
        if !self.round0.contains_key(&user) {
            return Err(ineligible(user, Phase::Round1));
        }
        if self.round1.contains_key(&user) {
            return Err(duplicate(user, Phase::Round1));
        }

        let mut recipients = BTreeSet::new();
        for share in &data.encrypted_shares {
            if share.u != user {
                return Err(rejected(format!(
                    "Share from user {} submitted by user {}",
                    share.u, user
                )));
            }
            if share.v == user || !self.round0.contains_key(&share.v) {
                return Err(rejected(format!("Share for unknown recipient {}", share.v)));
            }
            if !recipients.insert(share.v) {
                return Err(rejected(format!("Two shares for recipient {}", share.v)));
            }
        }

        self.round1.insert(user, data.encrypted_shares);
        debug!(user, shares = recipients.len(), "Round 1 shares accepted");
        self.close_if_complete();
        Ok(())
    }

    /// Envelopes addressed to `user`
    pub fn round1_data(&self, user: UserId) -> Result<Round1ServerData> {
        self.served_after(Phase::Round1)?;
        if !self.round0.contains_key(&user) {
            return Err(ineligible(user, Phase::Round1));
        }
        Ok(Round1ServerData {
            encrypted_shares_for_me: self
                .round1
                .values()
                .flatten()
                .filter(|share| share.v == user)
                .cloned()
                .collect(),
        })
    }

    // ---- Round 2 ----

    pub fn submit_round2(&mut self, user: UserId, data: Round2ClientData<V>) -> Result<()> {
        self.accepting(Phase::Round2)?;
        if !self.round1.contains_key(&user) {
            return Err(ineligible(user, Phase::Round2));
        }
        if data.origin != user {
            return Err(rejected(format!(
                "Masked value of user {} submitted by user {}",
                data.origin, user
            )));
        }
        if self.round2.contains_key(&user) {
            return Err(duplicate(user, Phase::Round2));
        }

        self.round2.insert(user, data.masked_value);
        debug!(user, collected = self.round2.len(), "Masked value accepted");
        self.close_if_complete();
        Ok(())
    }

    pub fn round2_data(&self) -> Result<Round2ServerData> {
        self.served_after(Phase::Round2)?;
        Ok(Round2ServerData {
            remaining_users: self.round2.keys().copied().collect(),
        })
    }

    // ---- Round 4 ----

    pub fn submit_round4(&mut self, user: UserId, data: Round4ClientData) -> Result<()> {
        self.accepting(Phase::Round4)?;
        if !self.round2.contains_key(&user) {
            return Err(ineligible(user, Phase::Round4));
        }
        if self.round4.contains_key(&user) {
            return Err(duplicate(user, Phase::Round4));
        }

        let mut origins = BTreeSet::new();
        for (revealed, survivor) in data
            .b_uv
            .iter()
            .map(|s| (s, true))
            .chain(data.s_uv.iter().map(|s| (s, false)))
        {
            if revealed.destination != user {
                return Err(rejected(format!(
                    "User {} revealed a share held by user {}",
                    user, revealed.destination
                )));
            }
            if self.round2.contains_key(&revealed.origin) != survivor {
                return Err(rejected(format!(
                    "Wrong kind of share revealed for user {}",
                    revealed.origin
                )));
            }
            if !self.was_routed(revealed.origin, user) {
                return Err(rejected(format!(
                    "User {} never received a share from user {}",
                    user, revealed.origin
                )));
            }
            if !origins.insert(revealed.origin) {
                return Err(rejected(format!(
                    "Two shares revealed for user {}",
                    revealed.origin
                )));
            }
        }

        self.round4.insert(user, data);
        debug!(user, collected = self.round4.len(), "Round 4 shares accepted");
        self.close_if_complete();
        Ok(())
    }

    pub fn round4_data(&self) -> Result<Round4ServerData<V>> {
        self.served_after(Phase::Round4)?;
        let value = self
            .result
            .clone()
            .ok_or(CoordinatorError::NotReady(Phase::Round4))?;
        Ok(Round4ServerData { value })
    }

    /// Close the current phase with whatever was collected so far
    pub fn finish_collection(&mut self) -> Result<Phase> {
        if let Some(reason) = &self.abort_reason {
            return Err(CoordinatorError::Aborted(reason.clone()));
        }
        if self.phase == Phase::Finished {
            return Err(rejected("Session already finished".into()));
        }

        self.close_phase();
        Ok(self.phase)
    }

    fn submissions(&self) -> usize {
        match self.phase {
            Phase::Login => self.users.len(),
            Phase::Round0 => self.round0.len(),
            Phase::Round1 => self.round1.len(),
            Phase::Round2 => self.round2.len(),
            Phase::Round4 => self.round4.len(),
            Phase::Finished | Phase::Aborted => 0,
        }
    }

    fn eligible(&self) -> usize {
        match self.phase {
            Phase::Login => self.config.number_of_users,
            Phase::Round0 => self.users.len(),
            Phase::Round1 => self.round0.len(),
            Phase::Round2 => self.round1.len(),
            Phase::Round4 => self.round2.len(),
            Phase::Finished | Phase::Aborted => 0,
        }
    }

    fn was_routed(&self, from: UserId, to: UserId) -> bool {
        self.round1
            .get(&from)
            .map_or(false, |shares| shares.iter().any(|share| share.v == to))
    }

    fn accepting(&self, phase: Phase) -> Result<()> {
        if let Some(reason) = &self.abort_reason {
            return Err(CoordinatorError::Aborted(reason.clone()));
        }
        if self.phase < phase {
            return Err(CoordinatorError::NotReady(self.phase));
        }
        if self.phase > phase {
            return Err(rejected(format!("Collection of {} is closed", phase)));
        }
        Ok(())
    }

    fn served_after(&self, phase: Phase) -> Result<()> {
        if let Some(reason) = &self.abort_reason {
            return Err(CoordinatorError::Aborted(reason.clone()));
        }
        if self.phase <= phase {
            return Err(CoordinatorError::NotReady(phase));
        }
        Ok(())
    }

    fn close_if_complete(&mut self) {
        if self.submissions() >= self.eligible() {
            self.close_phase();
        }
    }

    fn close_phase(&mut self) {
        // Every submitter must keep at least t peers
        let submitted = self.submissions();
        if submitted <= self.config.threshold {
            self.abort(AbortReason::ThresholdUndercut);
            return;
        }

        let next = match self.phase {
            Phase::Login => {
                self.config.number_of_users = self.users.len();
                Phase::Round0
            }
            Phase::Round0 => Phase::Round1,
            Phase::Round1 => Phase::Round2,
            Phase::Round2 => Phase::Round4,
            Phase::Round4 => {
                match unmask(
                    &self.config,
                    &self.round0,
                    &self.round1,
                    &self.round2,
                    &self.round4,
                ) {
                    Ok(value) => {
                        self.result = Some(value);
                        Phase::Finished
                    }
                    Err(reason) => {
                        self.abort(reason);
                        return;
                    }
                }
            }
            Phase::Finished | Phase::Aborted => return,
        };

        info!(from = %self.phase, to = %next, submitted, "Collection closed");
        self.phase = next;
    }

    fn abort(&mut self, reason: AbortReason) {
        warn!(phase = %self.phase, %reason, "Session aborted");
        self.phase = Phase::Aborted;
        self.abort_reason = Some(reason);
        self.round1.clear();
        self.round4.clear();
    }
}

fn rejected(reason: String) -> CoordinatorError {
    CoordinatorError::Rejected(reason)
}

fn ineligible(user: UserId, phase: Phase) -> CoordinatorError {
    rejected(format!("User {} is not eligible for {}", user, phase))
}

fn duplicate(user: UserId, phase: Phase) -> CoordinatorError {
    rejected(format!("User {} already submitted for {}", user, phase))
}
