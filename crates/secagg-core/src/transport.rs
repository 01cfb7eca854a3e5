//! Boundary with the coordination server

use crate::protocol::{
    Round0ServerData, Round1ClientData, Round1ServerData, Round2ClientData, Round2ServerData,
    Round4ClientData, Round4ServerData,
};
use crate::{AggregateValue, Configuration, PublicKeysOfUser, Result, UserId};

pub use ::async_trait::async_trait;

/// Request-in / response-out exchange with the server, one call per
/// round message.
///
/// Fetches resolve once the server has closed the matching collection
/// phase; until then implementations wait or poll.
#[async_trait]
pub trait Transport<V: AggregateValue>: Send + Sync {
    /// Register and obtain a user identifier
    async fn login(&self) -> Result<UserId>;

    /// Session configuration, available once login has closed
    async fn setup(&self) -> Result<Configuration>;

    /// Publish this user's public keys
    async fn send_round0(&self, user: UserId, data: &PublicKeysOfUser) -> Result<()>;

    /// Key records of every registered user
    async fn fetch_round0(&self) -> Result<Round0ServerData>;

    /// Hand over the sealed share bundles for routing
    async fn send_round1(&self, user: UserId, data: &Round1ClientData) -> Result<()>;

    /// Envelopes addressed to `user`
    async fn fetch_round1(&self, user: UserId) -> Result<Round1ServerData>;

    /// Submit the masked value
    async fn send_round2(&self, user: UserId, data: &Round2ClientData<V>) -> Result<()>;

    /// Users whose masked value was accepted
    async fn fetch_round2(&self) -> Result<Round2ServerData>;

    /// Reveal shares for unmasking
    async fn send_round4(&self, user: UserId, data: &Round4ClientData) -> Result<()>;

    /// The aggregate
    async fn fetch_round4(&self) -> Result<Round4ServerData<V>>;
}
