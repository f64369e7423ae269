//! HTTP API layer for livepoll.
//!
//! This crate provides the REST API and real-time streaming:
//!
//! - **Endpoints**: host (sessions, polls, results) and participant
//!   (join, answer) APIs
//! - **Extractors**: host authentication
//! - **Middleware**: bearer-token authentication
//! - **Streaming**: WebSocket and Server-Sent Events session channels
//! - **Pub/Sub**: Redis relay carrying session events between instances
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod pubsub;
pub mod response;
pub mod sse;
pub mod streaming;

pub use endpoints::{health_check, router};
pub use middleware::{AppState, auth_middleware};
pub use pubsub::RedisRelay;
pub use streaming::{StreamingState, streaming_handler};
