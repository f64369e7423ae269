//! Event publisher service.
//!
//! Provides an abstraction for publishing real-time session events.
//! The actual fan-out lives in the api crate (WebSocket/SSE hub, optionally
//! relayed over Redis Pub/Sub).

use async_trait::async_trait;
use livepoll_common::AppResult;
use livepoll_db::entities::{poll, poll::PollType, poll_option};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Option as shown to participants when a poll is published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOption {
    pub id: String,
    pub position: i32,
    pub text: String,
}

impl From<&poll_option::Model> for EventOption {
    fn from(option: &poll_option::Model) -> Self {
        Self {
            id: option.id.clone(),
            position: option.position,
            text: option.text.clone(),
        }
    }
}

/// Who answered, as shown to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventParticipant {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Events delivered on a session channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SessionEvent {
    /// A poll moved from draft to published.
    PollPublished {
        poll_id: String,
        question: String,
        #[serde(rename = "type")]
        poll_type: PollType,
        options: Vec<EventOption>,
    },
    /// A participant submitted or revised a response.
    NewResponse {
        poll_id: String,
        participant: EventParticipant,
        payload: JsonValue,
    },
}

impl SessionEvent {
    /// Wire name of the event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PollPublished { .. } => "pollPublished",
            Self::NewResponse { .. } => "newResponse",
        }
    }

    /// The event body without the `type` tag.
    #[must_use]
    pub fn body(&self) -> JsonValue {
        serde_json::to_value(self)
            .ok()
            .and_then(|mut v| v.get_mut("body").map(JsonValue::take))
            .unwrap_or_default()
    }
}

/// Trait for publishing real-time events.
///
/// This allows the core services to publish events
/// without directly depending on the transport.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Deliver an event to every subscriber of the session channel.
    async fn publish_session_event(&self, session_id: &str, event: SessionEvent) -> AppResult<()>;

    /// Publish a poll published event.
    async fn publish_poll_published(
        &self,
        poll: &poll::Model,
        options: &[poll_option::Model],
    ) -> AppResult<()> {
        let event = SessionEvent::PollPublished {
            poll_id: poll.id.clone(),
            question: poll.question.clone(),
            poll_type: poll.poll_type,
            options: options.iter().map(EventOption::from).collect(),
        };
        self.publish_session_event(&poll.session_id, event).await
    }

    /// Publish a new response event.
    async fn publish_new_response(
        &self,
        session_id: &str,
        poll_id: &str,
        participant: EventParticipant,
        payload: JsonValue,
    ) -> AppResult<()> {
        let event = SessionEvent::NewResponse {
            poll_id: poll_id.to_string(),
            participant,
            payload,
        };
        self.publish_session_event(session_id, event).await
    }
}

/// A no-op implementation of EventPublisher for testing or when real-time events are disabled.
#[derive(Clone, Default)]
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish_session_event(&self, _session_id: &str, _event: SessionEvent) -> AppResult<()> {
        Ok(())
    }
}

/// Wrapper for boxed EventPublisher trait object.
pub type EventPublisherService = Arc<dyn EventPublisher>;


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_poll_published_wire_format() {
        let event = SessionEvent::PollPublished {
            poll_id: "p1".to_string(),
            question: "Color?".to_string(),
            poll_type: PollType::SingleChoice,
            options: vec![EventOption {
                id: "o1".to_string(),
                position: 0,
                text: "Red".to_string(),
            }],
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "pollPublished",
                "body": {
                    "pollId": "p1",
                    "question": "Color?",
                    "type": "single-choice",
                    "options": [{ "id": "o1", "position": 0, "text": "Red" }],
                }
            })
        );
        assert_eq!(event.name(), "pollPublished");
    }

    #[test]
    fn test_new_response_wire_format() {
        let event = SessionEvent::NewResponse {
            poll_id: "p1".to_string(),
            participant: EventParticipant {
                id: "u1".to_string(),
                name: "Ana".to_string(),
                email: "a@x.com".to_string(),
            },
            payload: json!({ "optionId": "o1" }),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "newResponse");
        assert_eq!(value["body"]["participant"]["name"], "Ana");
        assert_eq!(value["body"]["payload"]["optionId"], "o1");

        let back: SessionEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
        assert_eq!(event.body()["pollId"], "p1");
        assert!(event.body().get("type").is_none());
    }
}
