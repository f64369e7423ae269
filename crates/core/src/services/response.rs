//! Response store service.

use std::collections::HashSet;

use chrono::Utc;
use livepoll_common::{AppError, AppResult, IdGenerator, ResubmissionPolicy};
use livepoll_db::{
    entities::{
        poll::{PollStatus, PollType},
        poll_option, response,
    },
    repositories::{ParticipantRepository, PollRepository, ResponseRepository, SubmitOutcome},
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::services::event_publisher::{EventParticipant, EventPublisherService};
use crate::services::poll::status_name;

/// Maximum length of an open-ended answer.
const MAX_TEXT_LEN: usize = 2000;

/// Answer payload. The accepted shape depends on the poll type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsePayload {
    /// Open-ended answer.
    Text { text: String },
    /// Single-choice answer.
    Single {
        #[serde(rename = "optionId")]
        option_id: String,
    },
    /// Multiple-choice answer.
    Multiple {
        #[serde(rename = "optionIds")]
        option_ids: Vec<String>,
    },
}

impl ResponsePayload {
    /// Option ids referenced by this payload.
    #[must_use]
    pub fn option_ids(&self) -> &[String] {
        match self {
            Self::Text { .. } => &[],
            Self::Single { option_id } => std::slice::from_ref(option_id),
            Self::Multiple { option_ids } => option_ids,
        }
    }
}

/// Input for submitting a response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponseInput {
    pub participant_id: String,
    #[serde(flatten)]
    pub payload: ResponsePayload,
}

/// Response store service.
#[derive(Clone)]
pub struct ResponseService {
    response_repo: ResponseRepository,
    poll_repo: PollRepository,
    participant_repo: ParticipantRepository,
    event_publisher: Option<EventPublisherService>,
    id_gen: IdGenerator,
    resubmission: ResubmissionPolicy,
}

impl ResponseService {
    /// Create a new response service.
    #[must_use]
    pub const fn new(
        response_repo: ResponseRepository,
        poll_repo: PollRepository,
        participant_repo: ParticipantRepository,
        resubmission: ResubmissionPolicy,
    ) -> Self {
        Self {
            response_repo,
            poll_repo,
            participant_repo,
            event_publisher: None,
            id_gen: IdGenerator::new(),
            resubmission,
        }
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = Some(event_publisher);
    }

    /// Record (or revise) a participant's answer to a published poll.
    pub async fn submit(
        &self,
        poll_id: &str,
        input: SubmitResponseInput,
    ) -> AppResult<response::Model> {
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        let participant = self.participant_repo.get_by_id(&input.participant_id).await?;

        if participant.session_id != poll.session_id {
            return Err(AppError::Validation(
                "Participant does not belong to this poll's session".to_string(),
            ));
        }

        if poll.status != PollStatus::Published {
            return Err(not_open(poll.status));
        }

        let options = if poll.poll_type.has_options() {
            self.poll_repo.find_options(&poll.id).await?
        } else {
            vec![]
        };
        let payload = normalize_payload(poll.poll_type, &options, input.payload)?;
        let payload_json = serde_json::to_value(&payload)
            .map_err(|e| AppError::Internal(format!("Failed to encode payload: {e}")))?;

        let now = Utc::now();
        let model = response::ActiveModel {
            id: Set(self.id_gen.generate()),
            poll_id: Set(poll.id.clone()),
            participant_id: Set(participant.id.clone()),
            payload: Set(payload_json.clone()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        // The repository re-checks the status under a row lock.
        let stored = match self
            .response_repo
            .submit(model, &poll.id, &participant.id, self.resubmission)
            .await?
        {
            SubmitOutcome::Stored(response) => response,
            SubmitOutcome::PollMissing => {
                return Err(AppError::NotFound(format!("Poll not found: {poll_id}")));
            }
            SubmitOutcome::PollNotOpen(status) => return Err(not_open(status)),
            SubmitOutcome::Duplicate => {
                return Err(AppError::Conflict(
                    "A response to this poll was already submitted".to_string(),
                ));
            }
        };

        debug!(poll_id = %poll.id, participant_id = %participant.id, "Response stored");

        if let Some(ref event_publisher) = self.event_publisher
            && let Err(e) = event_publisher
                .publish_new_response(
                    &poll.session_id,
                    &poll.id,
                    EventParticipant {
                        id: participant.id.clone(),
                        name: participant.name.clone(),
                        email: participant.email.clone(),
                    },
                    payload_json,
                )
                .await
        {
            warn!(error = %e, poll_id = %poll.id, "Failed to publish new response event");
        }

        Ok(stored)
    }
}

fn not_open(status: PollStatus) -> AppError {
    AppError::InvalidState(format!(
        "Poll is not accepting responses (status: {})",
        status_name(status)
    ))
}

/// Check a payload against the poll type and its options.
///
/// Text is trimmed. Multiple-choice ids are de-duplicated, keeping first
/// occurrence order.
pub fn normalize_payload(
    poll_type: PollType,
    options: &[poll_option::Model],
    payload: ResponsePayload,
) -> AppResult<ResponsePayload> {
    let known: HashSet<&str> = options.iter().map(|o| o.id.as_str()).collect();
    let check = |id: &str| {
        if known.contains(id) {
            Ok(())
        } else {
            Err(AppError::Validation(format!(
                "Option {id} does not belong to this poll"
            )))
        }
    };

    match (poll_type, payload) {
        (PollType::OpenEnded, ResponsePayload::Text { text }) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(AppError::Validation("Answer cannot be blank".to_string()));
            }
            if text.chars().count() > MAX_TEXT_LEN {
                return Err(AppError::Validation(format!(
                    "Answer is too long (max {MAX_TEXT_LEN} chars)"
                )));
            }
            Ok(ResponsePayload::Text {
                text: text.to_string(),
            })
        }
        (PollType::SingleChoice, ResponsePayload::Single { option_id }) => {
            check(&option_id)?;
            Ok(ResponsePayload::Single { option_id })
        }
        (PollType::MultipleChoice, ResponsePayload::Multiple { option_ids }) => {
            if option_ids.is_empty() {
                return Err(AppError::Validation(
                    "Select at least one option".to_string(),
                ));
            }
            let mut seen = HashSet::new();
            let mut unique = Vec::with_capacity(option_ids.len());
            for id in option_ids {
                check(&id)?;
                if seen.insert(id.clone()) {
                    unique.push(id);
                }
            }
            Ok(ResponsePayload::Multiple { option_ids: unique })
        }
        (poll_type, _) => Err(AppError::Validation(format!(
            "Payload shape does not match a {} poll",
            match poll_type {
                PollType::SingleChoice => "single-choice",
                PollType::MultipleChoice => "multiple-choice",
                PollType::OpenEnded => "open-ended",
            }
        ))),
    }
}
