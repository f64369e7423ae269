//! Participant endpoints: join a session and answer its polls.
//!
//! None of these require authentication. A participant is identified by the
//! id returned from `join`.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use livepoll_common::AppResult;
use livepoll_core::{JoinSessionInput, SubmitResponseInput};
use livepoll_db::entities::{participant, response};
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::host::{PollResponse, SessionResponse};
use crate::{middleware::AppState, response::ApiResponse};

/// Participant response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantResponse {
    pub id: String,
    pub session_id: String,
    pub name: String,
    pub email: String,
}

impl From<participant::Model> for ParticipantResponse {
    fn from(participant: participant::Model) -> Self {
        Self {
            id: participant.id,
            session_id: participant.session_id,
            name: participant.name,
            email: participant.email,
        }
    }
}

/// Join result.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub session: SessionResponse,
    pub participant: ParticipantResponse,
}

/// Stored answer.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub id: String,
    pub poll_id: String,
    pub participant_id: String,
    pub payload: JsonValue,
    pub updated_at: String,
}

impl From<response::Model> for SubmissionResponse {
    fn from(response: response::Model) -> Self {
        Self {
            id: response.id,
            poll_id: response.poll_id,
            participant_id: response.participant_id,
            payload: response.payload,
            updated_at: response.updated_at.to_rfc3339(),
        }
    }
}

/// Resolve a join code.
async fn lookup_session(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<ApiResponse<SessionResponse>> {
    let session = state.session_service.lookup_by_code(&code).await?;
    Ok(ApiResponse::ok(session.into()))
}

/// Join a session. Joining again with the same email returns the same participant.
async fn join_session(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<JoinSessionInput>,
) -> AppResult<ApiResponse<JoinResponse>> {
    let (session, participant) = state.participant_service.join_by_code(&code, req).await?;

    Ok(ApiResponse::ok(JoinResponse {
        session: session.into(),
        participant: participant.into(),
    }))
}

async fn published_polls(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<ApiResponse<Vec<PollResponse>>> {
    let polls = state.poll_service.list_published(&code).await?;
    Ok(ApiResponse::ok(polls.into_iter().map(Into::into).collect()))
}

async fn submit_response(
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    Json(req): Json<SubmitResponseInput>,
) -> AppResult<ApiResponse<SubmissionResponse>> {
    let response = state.response_service.submit(&poll_id, req).await?;
    Ok(ApiResponse::ok(response.into()))
}

/// Create the participant router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions/{code}", get(lookup_session))
        .route("/sessions/{code}/join", post(join_session))
        .route("/sessions/{code}/polls", get(published_polls))
        .route("/polls/{poll_id}/submit", post(submit_response))
}
