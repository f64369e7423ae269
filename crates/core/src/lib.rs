//! Core business logic for livepoll.
//!
//! Services sit between the HTTP layer and the repositories. They own
//! validation, ownership checks and the poll lifecycle, and hand committed
//! changes to an [`EventPublisher`] for real-time fan-out.

pub mod services;

pub use services::*;
