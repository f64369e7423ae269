//! API endpoints.

mod health;
mod host;
mod participant;

pub use health::health_check;

use axum::Router;

use crate::middleware::AppState;
use crate::sse;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/host", host::router())
        .nest("/participant", participant::router())
        .nest("/streaming/sse", sse::router())
}
