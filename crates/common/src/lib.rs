//! Common utilities and shared types for livepoll.
//!
//! This crate provides foundational components used across all livepoll crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based identifiers, access tokens and session
//!   join codes via [`IdGenerator`]
//!
//! # Example
//!
//! ```no_run
//! use livepoll_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let code = id_gen.generate_join_code(config.polling.join_code_length);
//!     println!("Join with: {}", code);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;

pub use config::{Config, PollingConfig, ResubmissionPolicy};
pub use error::{AppError, AppResult};
pub use id::{IdGenerator, normalize_join_code};
