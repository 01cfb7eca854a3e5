//! Round payloads exchanged with the server

use crate::{AddressedShare, EncryptedShare, PublicKeysOfUser, UserId};
use serde::{Deserialize, Serialize};

/// Login response: the identifier the server assigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    /// Assigned user
    pub user_id: UserId,
}

/// A client message tagged with its sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission<T> {
    /// Sending user
    pub user_id: UserId,
    /// Round payload
    pub data: T,
}

/// Round 0 server message: public keys of every registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round0ServerData {
    /// Collected key records, possibly including the receiver's own
    pub collected_data: Vec<PublicKeysOfUser>,
}

/// Round 1 client message: one sealed share bundle per peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round1ClientData {
    /// Envelopes addressed to peers
    pub encrypted_shares: Vec<EncryptedShare>,
}

/// Round 1 server message: envelopes addressed to the receiver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round1ServerData {
    /// Envelopes from surviving peers
    pub encrypted_shares_for_me: Vec<EncryptedShare>,
}

/// Round 2 client message: the masked contribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round2ClientData<V> {
    /// Value plus self-mask plus pairwise masks
    pub masked_value: V,
    /// Contributing user
    pub origin: UserId,
}

/// Round 2 server message: users whose masked value was accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round2ServerData {
    /// Surviving users (U3)
    pub remaining_users: Vec<UserId>,
}

/// Round 4 client message: shares revealed for unmasking
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Round4ClientData {
    /// Mask-key shares of surviving senders
    pub b_uv: Vec<AddressedShare>,
    /// Key shares of senders that dropped after round 1
    pub s_uv: Vec<AddressedShare>,
}

/// Round 4 server message: the aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round4ServerData<V> {
    /// Sum of all surviving contributions
    pub value: V,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SaInt;

    #[test]
    fn test_round2_json_shape() {
        let data = Round2ClientData {
            masked_value: SaInt(17),
            origin: 3,
        };

        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json, serde_json::json!({ "maskedValue": 17, "origin": 3 }));
    }

    #[test]
    fn test_round4_json_shape() {
        let json = serde_json::to_value(Round4ClientData::default()).unwrap();
        assert_eq!(json, serde_json::json!({ "b_uv": [], "s_uv": [] }));
    }
}
