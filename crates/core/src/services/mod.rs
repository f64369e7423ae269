//! Business logic services.

#![allow(missing_docs)]

pub mod event_publisher;
pub mod host;
pub mod participant;
pub mod poll;
pub mod response;
pub mod results;
pub mod session;

pub use event_publisher::{
    EventOption, EventParticipant, EventPublisher, EventPublisherService, NoOpEventPublisher,
    SessionEvent,
};
pub use host::{HostService, LoginInput, RegisterHostInput};
pub use participant::{JoinSessionInput, ParticipantService};
pub use poll::{CreatePollInput, PollService, PollWithOptions};
pub use response::{ResponsePayload, ResponseService, SubmitResponseInput};
pub use results::{OptionTally, PollResults, ResultSet, ResultsService, TextAnswer};
pub use session::{CreateSessionInput, SessionDetail, SessionService};
