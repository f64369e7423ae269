//! Host endpoints: account, sessions, polls and results.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use livepoll_common::AppResult;
use livepoll_core::{
    CreatePollInput, CreateSessionInput, LoginInput, PollResults, PollWithOptions,
    RegisterHostInput,
};
use livepoll_db::entities::{
    host,
    poll::{self, PollStatus, PollType},
    poll_option, session,
};
use serde::Serialize;

use crate::{extractors::AuthHost, middleware::AppState, response::ApiResponse};

/// Host account response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: String,
}

impl From<&host::Model> for HostResponse {
    fn from(host: &host::Model) -> Self {
        Self {
            id: host.id.clone(),
            name: host.name.clone(),
            email: host.email.clone(),
            created_at: host.created_at.to_rfc3339(),
        }
    }
}

/// Access token together with the host it belongs to.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub host: HostResponse,
}

impl From<host::Model> for AuthResponse {
    fn from(host: host::Model) -> Self {
        Self {
            host: HostResponse::from(&host),
            token: host.token,
        }
    }
}

/// Session response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: String,
    pub name: String,
    pub join_code: String,
    pub created_at: String,
}

impl From<session::Model> for SessionResponse {
    fn from(session: session::Model) -> Self {
        Self {
            id: session.id,
            name: session.name,
            join_code: session.join_code,
            created_at: session.created_at.to_rfc3339(),
        }
    }
}

/// Session with all of its polls.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetailResponse {
    #[serde(flatten)]
    pub session: SessionResponse,
    pub polls: Vec<PollResponse>,
}

/// Poll option response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOptionResponse {
    pub id: String,
    pub position: i32,
    pub text: String,
}

impl From<poll_option::Model> for PollOptionResponse {
    fn from(option: poll_option::Model) -> Self {
        Self {
            id: option.id,
            position: option.position,
            text: option.text,
        }
    }
}

/// Poll response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub id: String,
    pub session_id: String,
    pub question: String,
    #[serde(rename = "type")]
    pub poll_type: PollType,
    pub status: PollStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<PollOptionResponse>>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<String>,
}

impl From<poll::Model> for PollResponse {
    fn from(poll: poll::Model) -> Self {
        Self {
            id: poll.id,
            session_id: poll.session_id,
            question: poll.question,
            poll_type: poll.poll_type,
            status: poll.status,
            options: None,
            created_at: poll.created_at.to_rfc3339(),
            published_at: poll.published_at.map(|t| t.to_rfc3339()),
            closed_at: poll.closed_at.map(|t| t.to_rfc3339()),
        }
    }
}

impl From<PollWithOptions> for PollResponse {
    fn from(poll: PollWithOptions) -> Self {
        Self {
            options: Some(poll.options.into_iter().map(Into::into).collect()),
            ..Self::from(poll.poll)
        }
    }
}

/// Register a host account.
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterHostInput>,
) -> AppResult<ApiResponse<AuthResponse>> {
    let host = state.host_service.register(req).await?;
    Ok(ApiResponse::created(host.into()))
}

/// Exchange credentials for the access token.
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginInput>,
) -> AppResult<ApiResponse<AuthResponse>> {
    let host = state.host_service.login(req).await?;
    Ok(ApiResponse::ok(host.into()))
}

async fn create_session(
    AuthHost(host): AuthHost,
    State(state): State<AppState>,
    Json(req): Json<CreateSessionInput>,
) -> AppResult<ApiResponse<SessionResponse>> {
    let session = state.session_service.create(&host.id, req).await?;
    Ok(ApiResponse::created(session.into()))
}

async fn list_sessions(
    AuthHost(host): AuthHost,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<SessionResponse>>> {
    let sessions = state.session_service.list_for_host(&host.id).await?;
    Ok(ApiResponse::ok(sessions.into_iter().map(Into::into).collect()))
}

/// Session detail, including draft and closed polls.
async fn get_session(
    AuthHost(host): AuthHost,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> AppResult<ApiResponse<SessionDetailResponse>> {
    let detail = state
        .session_service
        .get_for_host(&session_id, &host.id)
        .await?;

    Ok(ApiResponse::ok(SessionDetailResponse {
        session: detail.session.into(),
        polls: detail.polls.into_iter().map(Into::into).collect(),
    }))
}

async fn create_poll(
    AuthHost(host): AuthHost,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<CreatePollInput>,
) -> AppResult<ApiResponse<PollResponse>> {
    let poll = state
        .poll_service
        .create(&session_id, &host.id, req)
        .await?;
    Ok(ApiResponse::created(poll.into()))
}

async fn publish_poll(
    AuthHost(host): AuthHost,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<ApiResponse<PollResponse>> {
    let poll = state.poll_service.publish(&poll_id, &host.id).await?;
    Ok(ApiResponse::ok(poll.into()))
}

async fn close_poll(
    AuthHost(host): AuthHost,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<ApiResponse<PollResponse>> {
    let poll = state.poll_service.close(&poll_id, &host.id).await?;
    Ok(ApiResponse::ok(poll.into()))
}

async fn poll_results(
    AuthHost(host): AuthHost,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<ApiResponse<PollResults>> {
    let results = state.results_service.get_results(&poll_id, &host.id).await?;
    Ok(ApiResponse::ok(results))
}

/// Create the host router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/sessions", post(create_session).get(list_sessions))
        .route("/sessions/{session_id}", get(get_session))
        .route("/sessions/{session_id}/polls", post(create_poll))
        .route("/polls/{poll_id}/publish", put(publish_poll))
        .route("/polls/{poll_id}/close", put(close_poll))
        .route("/polls/{poll_id}/results", get(poll_results))
}
