//! Redis Pub/Sub relay for session events.
//!
//! With several server instances behind a load balancer, a participant's
//! submission may land on one instance while the host's WebSocket sits on
//! another. Every instance publishes session events to
//! `{prefix}:session:{sessionId}` and pattern-subscribes to
//! `{prefix}:session:*`, handing whatever arrives to its local
//! [`StreamingState`].

#![allow(missing_docs)]

use async_trait::async_trait;
use fred::clients::{Client, SubscriberClient};
use fred::error::Error as RedisError;
use fred::interfaces::{ClientLike, EventInterface, PubsubInterface};
use fred::types::config::Config as RedisConfig;
use livepoll_common::{AppError, AppResult};
use livepoll_core::{EventPublisher, SessionEvent};
use tracing::{debug, info, warn};

use crate::streaming::StreamingState;

/// Redis-backed session event relay.
#[derive(Clone)]
pub struct RedisRelay {
    publisher: Client,
    subscriber: SubscriberClient,
    prefix: String,
}

impl RedisRelay {
    /// Connect the publishing and subscribing clients.
    pub async fn new(redis_url: &str, prefix: &str) -> Result<Self, RedisError> {
        let config = RedisConfig::from_url(redis_url)?;

        let publisher = Client::new(config.clone(), None, None, None);
        publisher.init().await?;

        let subscriber = SubscriberClient::new(config, None, None, None);
        subscriber.init().await?;

        info!("Redis Pub/Sub relay initialized");

        Ok(Self {
            publisher,
            subscriber,
            prefix: prefix.to_string(),
        })
    }

    /// Channel carrying the events of one session.
    #[must_use]
    pub fn channel(&self, session_id: &str) -> String {
        session_channel(&self.prefix, session_id)
    }

    /// Subscribe to every session channel and forward messages to `streaming`.
    pub async fn start(&self, streaming: StreamingState) -> Result<(), RedisError> {
        let pattern = format!("{}:session:*", self.prefix);
        self.subscriber.psubscribe(pattern.as_str()).await?;

        info!(pattern = %pattern, "Subscribed to session channels");

        let prefix = self.prefix.clone();
        let mut message_stream = self.subscriber.message_rx();

        tokio::spawn(async move {
            while let Ok(message) = message_stream.recv().await {
                let Some(session_id) = session_id_from_channel(&prefix, &message.channel) else {
                    continue;
                };
                let Some(payload) = message.value.as_string() else {
                    continue;
                };

                match serde_json::from_str::<SessionEvent>(&payload) {
                    Ok(event) => {
                        let name = event.name();
                        let delivered = streaming.deliver(session_id, event).await;
                        debug!(session_id, event = name, delivered, "Relayed session event");
                    }
                    Err(e) => {
                        warn!("Failed to parse Pub/Sub message: {}", e);
                    }
                }
            }
            info!("Pub/Sub message stream ended");
        });

        Ok(())
    }

    /// Close both Redis connections.
    pub async fn shutdown(&self) -> Result<(), RedisError> {
        self.subscriber.quit().await?;
        self.publisher.quit().await?;
        info!("Redis Pub/Sub relay shut down");
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for RedisRelay {
    async fn publish_session_event(&self, session_id: &str, event: SessionEvent) -> AppResult<()> {
        let payload = serde_json::to_string(&event)
            .map_err(|e| AppError::Internal(format!("Serialization error: {e}")))?;
        let channel = self.channel(session_id);

        let _: () = self
            .publisher
            .publish(channel.as_str(), payload)
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;

        debug!(channel = %channel, event = event.name(), "Published session event");
        Ok(())
    }
}

fn session_channel(prefix: &str, session_id: &str) -> String {
    format!("{prefix}:session:{session_id}")
}

fn session_id_from_channel<'a>(prefix: &str, channel: &'a str) -> Option<&'a str> {
    channel
        .strip_prefix(prefix)?
        .strip_prefix(":session:")
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_channel() {
        assert_eq!(session_channel("livepoll", "s1"), "livepoll:session:s1");
    }

    #[test]
    fn test_session_id_from_channel() {
        assert_eq!(
            session_id_from_channel("livepoll", "livepoll:session:01hx"),
            Some("01hx")
        );
        assert_eq!(session_id_from_channel("livepoll", "other:session:01hx"), None);
        assert_eq!(session_id_from_channel("livepoll", "livepoll:session:"), None);
        assert_eq!(session_id_from_channel("livepoll", "livepoll:user:01hx"), None);
    }
}
