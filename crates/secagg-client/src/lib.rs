//! SecAgg Client
//!
//! HTTP transport connecting a participant to a `secagg-server`.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secagg_coordinator::{CoordinatorStatus, Phase};
use secagg_core::transport::async_trait;
use secagg_core::{
    AggregateValue, Configuration, Error, LoginData, PublicKeysOfUser, Result, Round0ServerData,
    Round1ClientData, Round1ServerData, Round2ClientData, Round2ServerData, Round4ClientData,
    Round4ServerData, Submission, Transport, UserId,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// HTTP-based transport
pub struct HttpTransport {
    /// HTTP client
    client: Client,
    /// Server URL
    url: String,
    /// Per-request timeout
    timeout: Duration,
    /// Wait between polls of a phase that is still open
    poll_interval: Duration,
    /// Polls before a fetch gives up
    poll_attempts: usize,
}

impl HttpTransport {
    /// Create a transport for the server at `url`
    pub fn new(url: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(250),
            poll_attempts: 1200,
        }
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the wait between polls
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set how many polls a fetch makes before failing
    pub fn with_poll_attempts(mut self, attempts: usize) -> Self {
        self.poll_attempts = attempts;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Close the collection phase that is currently open
    pub async fn finish(&self) -> Result<Phase> {
        let response = self
            .send(self.client.post(self.endpoint("/v1/admin/finish")))
            .await?;
        let finished: FinishResponse = parse(response).await?;
        Ok(finished.phase)
    }

    /// Current session status
    pub async fn status<V: AggregateValue>(&self) -> Result<CoordinatorStatus<V>> {
        let response = self.send(self.client.get(self.endpoint("/v1/status"))).await?;
        parse(response).await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(failure(response).await)
        }
    }

    /// Submit a round message tagged with the sender
    #[instrument(skip(self, data))]
    async fn submit<T: Serialize + Sync>(&self, path: &str, user: UserId, data: &T) -> Result<()> {
        let body = Submission {
            user_id: user,
            data,
        };
        self.send(self.client.post(self.endpoint(path)).json(&body))
            .await?;

        debug!(path, user, "Submitted");
        Ok(())
    }

    /// GET `path`, retrying while the server answers that the phase is open
    #[instrument(skip(self))]
    async fn poll<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        for attempt in 0..self.poll_attempts {
            let response = self
                .client
                .get(self.endpoint(path))
                .timeout(self.timeout)
                .send()
                .await
                .map_err(|e| Error::Transport(e.to_string()))?;

            if response.status() == StatusCode::CONFLICT {
                debug!(path, attempt, "Phase still open");
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }
            if !response.status().is_success() {
                return Err(failure(response).await);
            }
            return parse(response).await;
        }

        Err(Error::Timeout(format!(
            "{} after {} polls",
            path, self.poll_attempts
        )))
    }
}

async fn parse<R: DeserializeOwned>(response: Response) -> Result<R> {
    response
        .json()
        .await
        .map_err(|e| Error::Deserialization(e.to_string()))
}

async fn failure(response: Response) -> Error {
    let status = response.status();
    let message = match response.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => "no error body".to_string(),
    };
    Error::Transport(format!("Server answered {}: {}", status, message))
}

#[async_trait]
impl<V: AggregateValue> Transport<V> for HttpTransport {
    async fn login(&self) -> Result<UserId> {
        let response = self.send(self.client.post(self.endpoint("/v1/login"))).await?;
        let login: LoginData = parse(response).await?;
        debug!(user_id = login.user_id, "Logged in");
        Ok(login.user_id)
    }

    async fn setup(&self) -> Result<Configuration> {
        self.poll("/v1/setup").await
    }

    async fn send_round0(&self, user: UserId, data: &PublicKeysOfUser) -> Result<()> {
        self.submit("/v1/round0", user, data).await
    }

    async fn fetch_round0(&self) -> Result<Round0ServerData> {
        self.poll("/v1/round0").await
    }

    async fn send_round1(&self, user: UserId, data: &Round1ClientData) -> Result<()> {
        self.submit("/v1/round1", user, data).await
    }

    async fn fetch_round1(&self, user: UserId) -> Result<Round1ServerData> {
        self.poll(&format!("/v1/round1/{}", user)).await
    }

    async fn send_round2(&self, user: UserId, data: &Round2ClientData<V>) -> Result<()> {
        self.submit("/v1/round2", user, data).await
    }

    async fn fetch_round2(&self) -> Result<Round2ServerData> {
        self.poll("/v1/round2").await
    }

    async fn send_round4(&self, user: UserId, data: &Round4ClientData) -> Result<()> {
        self.submit("/v1/round4", user, data).await
    }

    async fn fetch_round4(&self) -> Result<Round4ServerData<V>> {
        self.poll("/v1/round4").await
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
struct FinishResponse {
    phase: Phase,
}
