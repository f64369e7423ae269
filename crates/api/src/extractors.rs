//! Request extractors.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use livepoll_db::entities::host;

/// Authenticated host extractor.
#[derive(Debug, Clone)]
pub struct AuthHost(pub host::Model);

impl<S> FromRequestParts<S> for AuthHost
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by the auth middleware
        parts
            .extensions
            .get::<host::Model>()
            .cloned()
            .map(AuthHost)
            .ok_or((StatusCode::UNAUTHORIZED, "Unauthorized"))
    }
}
