//! In-process transport for tests and local runs

use crate::{Coordinator, Result, SharedCoordinator};
use secagg_core::transport::async_trait;
use secagg_core::{
    AggregateValue, Configuration, PublicKeysOfUser, Round0ServerData, Round1ClientData,
    Round1ServerData, Round2ClientData, Round2ServerData, Round4ClientData, Round4ServerData,
    Transport, UserId,
};
use std::time::Duration;
use tracing::instrument;

/// Default wait between polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Default number of polls before a fetch gives up
pub const DEFAULT_POLL_ATTEMPTS: usize = 500;

/// Talks to a coordinator in the same process
pub struct MemoryTransport<V: AggregateValue> {
    shared: SharedCoordinator<V>,
    poll_interval: Duration,
    poll_attempts: usize,
}

impl<V: AggregateValue> Clone for MemoryTransport<V> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            poll_interval: self.poll_interval,
            poll_attempts: self.poll_attempts,
        }
    }
}

impl<V: AggregateValue> MemoryTransport<V> {
    /// Create a transport over `shared`
    pub fn new(shared: SharedCoordinator<V>) -> Self {
        Self {
            shared,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
        }
    }

    /// Override polling behaviour
    pub fn with_polling(mut self, interval: Duration, attempts: usize) -> Self {
        self.poll_interval = interval;
        self.poll_attempts = attempts;
        self
    }

    async fn wait<R, F>(&self, f: F) -> Result<R>
    where
        F: FnMut(&Coordinator<V>) -> Result<R> + Send,
    {
        self.shared
            .wait_for(self.poll_attempts, self.poll_interval, f)
            .await
    }
}

#[async_trait]
impl<V: AggregateValue> Transport<V> for MemoryTransport<V> {
    #[instrument(skip(self))]
    async fn login(&self) -> secagg_core::Result<UserId> {
        Ok(self.shared.update(|c| c.login()).await?)
    }

    async fn setup(&self) -> secagg_core::Result<Configuration> {
        Ok(self.wait(|c| c.configuration()).await?)
    }

    #[instrument(skip(self, data))]
    async fn send_round0(&self, user: UserId, data: &PublicKeysOfUser) -> secagg_core::Result<()> {
        let data = data.clone();
        Ok(self.shared.update(move |c| c.submit_round0(user, data)).await?)
    }

    async fn fetch_round0(&self) -> secagg_core::Result<Round0ServerData> {
        Ok(self.wait(|c| c.round0_data()).await?)
    }

    #[instrument(skip(self, data))]
    async fn send_round1(&self, user: UserId, data: &Round1ClientData) -> secagg_core::Result<()> {
        let data = data.clone();
        Ok(self.shared.update(move |c| c.submit_round1(user, data)).await?)
    }

    async fn fetch_round1(&self, user: UserId) -> secagg_core::Result<Round1ServerData> {
        Ok(self.wait(|c| c.round1_data(user)).await?)
    }

    #[instrument(skip(self, data))]
    async fn send_round2(
        &self,
        user: UserId,
        data: &Round2ClientData<V>,
    ) -> secagg_core::Result<()> {
        let data = data.clone();
        Ok(self.shared.update(move |c| c.submit_round2(user, data)).await?)
    }

    async fn fetch_round2(&self) -> secagg_core::Result<Round2ServerData> {
        Ok(self.wait(|c| c.round2_data()).await?)
    }

    #[instrument(skip(self, data))]
    async fn send_round4(&self, user: UserId, data: &Round4ClientData) -> secagg_core::Result<()> {
        let data = data.clone();
        Ok(self.shared.update(move |c| c.submit_round4(user, data)).await?)
    }

    async fn fetch_round4(&self) -> secagg_core::Result<Round4ServerData<V>> {
        Ok(self.wait(|c| c.round4_data()).await?)
    }
}
