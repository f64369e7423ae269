//! Server-Sent Events (SSE) for session channels.
//!
//! An alternative to the WebSocket channel for clients that only listen.
//! Each event carries the event name (`pollPublished`, `newResponse`) and
//! its JSON body.

#![allow(missing_docs)]

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use futures::stream::{self, Stream};
use livepoll_common::AppResult;
use livepoll_core::SessionEvent;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use crate::middleware::AppState;

/// Render a session event as an SSE event.
#[must_use]
pub fn to_sse_event(event: &SessionEvent) -> Event {
    Event::default()
        .event(event.name())
        .json_data(event.body())
        .unwrap_or_else(|_| Event::default().data("error"))
}

/// Session SSE stream.
async fn session_stream(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let session = state.session_service.get(&session_id).await?;
    let rx = state.streaming.subscribe(&session.id).await;
    info!(session_id = %session.id, "SSE subscriber connected");

    let stream = BroadcastStream::new(rx)
        .filter_map(|result| result.ok().map(|event| Ok(to_sse_event(&event))));

    let initial = stream::once(async move {
        Ok(Event::default()
            .event("connected")
            .json_data(serde_json::json!({ "sessionId": session.id }))
            .unwrap_or_else(|_| Event::default().data("connected")))
    });

    Ok(Sse::new(initial.chain(stream)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    ))
}

/// Create the SSE router.
pub fn router() -> Router<AppState> {
    Router::new().route("/sessions/{session_id}", get(session_stream))
}
