//! # SecAgg Server
//!
//! HTTP surface of the aggregation coordinator. Every route maps onto one
//! coordinator operation; fetches for a phase that has not closed yet
//! answer `409 Conflict` so clients poll until the data is served.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use secagg_coordinator::{CoordinatorError, CoordinatorStatus, SharedCoordinator};
use secagg_core::{
    Configuration, LoginData, PublicKeysOfUser, Round0ServerData, Round1ClientData,
    Round1ServerData, Round2ClientData, Round2ServerData, Round4ClientData, Round4ServerData,
    SaInt, Submission, UserId,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Application state
pub type AppState = SharedCoordinator<SaInt>;

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Coordinator failure rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(CoordinatorError);

impl From<CoordinatorError> for ApiError {
    fn from(e: CoordinatorError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoordinatorError::NotReady(_) => StatusCode::CONFLICT,
            CoordinatorError::Rejected(_) => StatusCode::BAD_REQUEST,
            CoordinatorError::Aborted(_) => StatusCode::GONE,
            CoordinatorError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if !self.0.is_retryable() {
            warn!(status = status.as_u16(), error = %self.0, "Request failed");
        }

        (
            status,
            Json(serde_json::json!({
                "error": self.0.to_string(),
                "retryable": self.0.is_retryable(),
            })),
        )
            .into_response()
    }
}

/// Build the service router over a shared coordinator
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/login", post(login))
        .route("/v1/setup", get(setup))
        .route("/v1/round0", post(submit_round0).get(round0))
        .route("/v1/round1", post(submit_round1))
        .route("/v1/round1/:user_id", get(round1))
        .route("/v1/round2", post(submit_round2).get(round2))
        .route("/v1/round4", post(submit_round4).get(round4))
        .route("/v1/admin/finish", post(finish))
        .route("/v1/status", get(status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "secagg-server",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn login(State(state): State<AppState>) -> ApiResult<LoginData> {
    let user_id = state.update(|c| c.login()).await?;
    Ok(Json(LoginData { user_id }))
}

async fn setup(State(state): State<AppState>) -> ApiResult<Configuration> {
    Ok(Json(state.read(|c| c.configuration()).await?))
}

async fn submit_round0(
    State(state): State<AppState>,
    Json(req): Json<Submission<PublicKeysOfUser>>,
) -> Result<StatusCode, ApiError> {
    let user = req.user_id;
    state.update(move |c| c.submit_round0(user, req.data)).await?;
    debug!(user, "Round 0 keys stored");
    Ok(StatusCode::OK)
}

async fn round0(State(state): State<AppState>) -> ApiResult<Round0ServerData> {
    Ok(Json(state.read(|c| c.round0_data()).await?))
}

async fn submit_round1(
    State(state): State<AppState>,
    Json(req): Json<Submission<Round1ClientData>>,
) -> Result<StatusCode, ApiError> {
    let user = req.user_id;
    let count = req.data.encrypted_shares.len();
    state.update(move |c| c.submit_round1(user, req.data)).await?;
    debug!(user, count, "Round 1 shares stored");
    Ok(StatusCode::OK)
}

async fn round1(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Round1ServerData> {
    Ok(Json(state.read(|c| c.round1_data(user_id)).await?))
}

async fn submit_round2(
    State(state): State<AppState>,
    Json(req): Json<Submission<Round2ClientData<SaInt>>>,
) -> Result<StatusCode, ApiError> {
    let user = req.user_id;
    state.update(move |c| c.submit_round2(user, req.data)).await?;
    debug!(user, "Round 2 masked value stored");
    Ok(StatusCode::OK)
}

async fn round2(State(state): State<AppState>) -> ApiResult<Round2ServerData> {
    Ok(Json(state.read(|c| c.round2_data()).await?))
}

async fn submit_round4(
    State(state): State<AppState>,
    Json(req): Json<Submission<Round4ClientData>>,
) -> Result<StatusCode, ApiError> {
    let user = req.user_id;
    state.update(move |c| c.submit_round4(user, req.data)).await?;
    debug!(user, "Round 4 shares stored");
    Ok(StatusCode::OK)
}

async fn round4(State(state): State<AppState>) -> ApiResult<Round4ServerData<SaInt>> {
    Ok(Json(state.read(|c| c.round4_data()).await?))
}

/// Close the collection phase that is currently open
async fn finish(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let phase = state.update(|c| c.finish_collection()).await?;
    info!(%phase, "Collection finished by operator");
    Ok(Json(serde_json::json!({ "phase": phase })))
}

async fn status(State(state): State<AppState>) -> Json<CoordinatorStatus<SaInt>> {
    Json(state.read(|c| c.status()).await)
}
