//! Database entities.

pub mod host;
pub mod participant;
pub mod poll;
pub mod poll_option;
pub mod response;
pub mod session;

pub use host::Entity as Host;
pub use participant::Entity as Participant;
pub use poll::Entity as Poll;
pub use poll_option::Entity as PollOption;
pub use response::Entity as Response;
pub use session::Entity as Session;
