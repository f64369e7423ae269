//! WebSocket streaming API.
//!
//! Clients connect to `/streaming` and attach to session channels with
//! `{"type":"connect","body":{"channel":"session","id":"<local id>","params":{"sessionId":"…"}}}`.
//! Events arrive as `{"type":"channel","body":{"id","type","body"}}`.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use livepoll_common::AppResult;
use livepoll_core::{EventPublisher, SessionEvent};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use tokio_stream::{StreamMap, wrappers::BroadcastStream};
use tracing::{debug, error, info, warn};

use crate::middleware::AppState;

/// Buffered events per session channel before slow subscribers lag.
const SESSION_CHANNEL_CAPACITY: usize = 256;

/// Client-to-server message.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Connect to a channel.
    Connect {
        channel: String,
        id: String,
        #[serde(default)]
        params: serde_json::Value,
    },
    /// Disconnect from a channel.
    Disconnect { id: String },
}

/// Server-to-client message.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Channel connected.
    Connected { id: String },
    /// Channel event.
    Channel {
        id: String,
        #[serde(rename = "type")]
        event_type: String,
        body: serde_json::Value,
    },
}

impl ServerMessage {
    /// Wrap a session event for the client-side channel `id`.
    #[must_use]
    pub fn from_event(id: &str, event: &SessionEvent) -> Self {
        Self::Channel {
            id: id.to_string(),
            event_type: event.name().to_string(),
            body: event.body(),
        }
    }
}

/// In-process fan-out of session events.
///
/// One broadcast channel per session, created on first subscription.
/// Delivery to a session nobody watches is a no-op.
#[derive(Clone, Default)]
pub struct StreamingState {
    sessions: Arc<RwLock<HashMap<String, broadcast::Sender<SessionEvent>>>>,
}

impl StreamingState {
    /// Create a new streaming state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a session's events.
    pub async fn subscribe(&self, session_id: &str) -> broadcast::Receiver<SessionEvent> {
        let mut sessions = self.sessions.write().await;

        if let Some(sender) = sessions.get(session_id) {
            return sender.subscribe();
        }

        let (sender, rx) = broadcast::channel(SESSION_CHANNEL_CAPACITY);
        sessions.insert(session_id.to_string(), sender);
        rx
    }

    /// Deliver an event to the local subscribers of a session.
    ///
    /// Returns how many subscribers received it.
    pub async fn deliver(&self, session_id: &str, event: SessionEvent) -> usize {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .and_then(|sender| sender.send(event).ok())
            .unwrap_or(0)
    }

    /// Number of local subscribers of a session.
    pub async fn subscriber_count(&self, session_id: &str) -> usize {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Drop channels that no longer have subscribers.
    pub async fn cleanup(&self) {
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, sender| sender.receiver_count() > 0);
    }
}

/// Publishing straight to local subscribers, for single-instance deployments.
#[async_trait]
impl EventPublisher for StreamingState {
    async fn publish_session_event(&self, session_id: &str, event: SessionEvent) -> AppResult<()> {
        let name = event.name();
        let delivered = self.deliver(session_id, event).await;
        debug!(session_id, event = name, delivered, "Session event delivered");
        Ok(())
    }
}

/// WebSocket handler for streaming.
pub async fn streaming_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    info!("New streaming connection");

    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Keyed by the client-chosen channel id.
    let mut subscriptions: StreamMap<String, BroadcastStream<SessionEvent>> = StreamMap::new();

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let Some(msg) = msg else { break };
                match msg {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                if let Some(response) =
                                    handle_client_message(client_msg, &mut subscriptions, &state).await
                                {
                                    let json = serde_json::to_string(&response).unwrap_or_default();
                                    if sender.send(Message::Text(json.into())).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                warn!("Failed to parse client message: {}", e);
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        info!("Client closed connection");
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                }
            }

            Some((id, item)) = subscriptions.next(), if !subscriptions.is_empty() => {
                match item {
                    Ok(event) => {
                        let msg = ServerMessage::from_event(&id, &event);
                        let json = serde_json::to_string(&msg).unwrap_or_default();
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(id = %id, "Streaming subscriber lagged: {}", e);
                    }
                }
            }
        }
    }

    state.streaming.cleanup().await;
    info!("Streaming connection closed");
}

/// Handle a client message.
async fn handle_client_message(
    msg: ClientMessage,
    subscriptions: &mut StreamMap<String, BroadcastStream<SessionEvent>>,
    state: &AppState,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Connect {
            channel,
            id,
            params,
        } => {
            if channel != "session" {
                warn!("Unknown channel: {}", channel);
                return None;
            }

            let Some(session_id) = params.get("sessionId").and_then(|v| v.as_str()) else {
                warn!("Session channel connection without sessionId param");
                return None;
            };

            if let Err(e) = state.session_service.get(session_id).await {
                warn!(session_id = %session_id, error = %e, "Rejected session channel");
                return None;
            }

            let rx = state.streaming.subscribe(session_id).await;
            subscriptions.insert(id.clone(), BroadcastStream::new(rx));
            info!(session_id = %session_id, id = %id, "Channel connected");

            Some(ServerMessage::Connected { id })
        }
        ClientMessage::Disconnect { id } => {
            subscriptions.remove(&id);
            info!(id = %id, "Channel disconnected");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use livepoll_core::{EventOption, EventParticipant};
    use livepoll_db::entities::poll::PollType;
    use serde_json::json;

    fn published(poll_id: &str) -> SessionEvent {
        SessionEvent::PollPublished {
            poll_id: poll_id.to_string(),
            question: "Color?".to_string(),
            poll_type: PollType::SingleChoice,
            options: vec![EventOption {
                id: "o1".to_string(),
                position: 0,
                text: "Red".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn test_deliver_reaches_session_subscribers_only() {
        let state = StreamingState::new();
        let mut s1 = state.subscribe("s1").await;
        let mut s2 = state.subscribe("s2").await;

        let delivered = state.deliver("s1", published("p1")).await;
        assert_eq!(delivered, 1);

        assert_eq!(s1.recv().await.unwrap(), published("p1"));
        assert!(s2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_deliver_without_subscribers() {
        let state = StreamingState::new();
        assert_eq!(state.deliver("nobody", published("p1")).await, 0);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives() {
        let state = StreamingState::new();
        let mut a = state.subscribe("s1").await;
        let mut b = state.subscribe("s1").await;

        state
            .publish_session_event(
                "s1",
                SessionEvent::NewResponse {
                    poll_id: "p1".to_string(),
                    participant: EventParticipant {
                        id: "u1".to_string(),
                        name: "Ana".to_string(),
                        email: "a@x.com".to_string(),
                    },
                    payload: json!({ "optionId": "o1" }),
                },
            )
            .await
            .unwrap();

        assert!(matches!(a.recv().await.unwrap(), SessionEvent::NewResponse { .. }));
        assert!(matches!(b.recv().await.unwrap(), SessionEvent::NewResponse { .. }));
    }

    #[tokio::test]
    async fn test_cleanup_drops_idle_channels() {
        let state = StreamingState::new();
        let rx = state.subscribe("s1").await;
        assert_eq!(state.subscriber_count("s1").await, 1);

        drop(rx);
        state.cleanup().await;
        assert_eq!(state.subscriber_count("s1").await, 0);
    }

    #[test]
    fn test_server_message_from_event() {
        let msg = ServerMessage::from_event("c1", &published("p1"));
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["type"], "channel");
        assert_eq!(value["body"]["id"], "c1");
        assert_eq!(value["body"]["type"], "pollPublished");
        assert_eq!(value["body"]["body"]["pollId"], "p1");
    }

    #[test]
    fn test_parse_connect_message() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "connect",
            "body": { "channel": "session", "id": "c1", "params": { "sessionId": "s1" } }
        }))
        .unwrap();

        assert!(matches!(msg, ClientMessage::Connect { ref channel, .. } if channel == "session"));
    }
}
