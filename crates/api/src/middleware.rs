//! API middleware.

#![allow(missing_docs)]

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use livepoll_core::{
    HostService, ParticipantService, PollService, ResponseService, ResultsService,
    SessionService,
};

use crate::streaming::StreamingState;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub host_service: HostService,
    pub session_service: SessionService,
    pub participant_service: ParticipantService,
    pub poll_service: PollService,
    pub response_service: ResponseService,
    pub results_service: ResultsService,
    pub streaming: StreamingState,
}

/// Authentication middleware.
///
/// A valid bearer token puts the host into the request extensions. Requests
/// without one pass through; host-only handlers reject them via `AuthHost`.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
        && let Ok(host) = state.host_service.authenticate_by_token(token).await
    {
        req.extensions_mut().insert(host);
    }

    next.run(req).await
}
