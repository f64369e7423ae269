//! Repositories.

mod host;
mod participant;
mod poll;
mod response;
mod session;

pub use host::HostRepository;
pub use participant::ParticipantRepository;
pub use poll::{ExclusivePublish, PollRepository};
pub use response::{ResponseRepository, SubmitOutcome};
pub use session::SessionRepository;
