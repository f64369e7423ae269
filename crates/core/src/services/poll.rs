//! Poll lifecycle service.
//!
//! Polls move `draft -> published -> closed`. Every transition is a
//! compare-and-set in the store; losing a race reports `InvalidState`.

use std::collections::HashMap;

use chrono::Utc;
use livepoll_common::{AppError, AppResult, IdGenerator, PollingConfig, normalize_join_code};
use livepoll_db::{
    entities::{
        poll::{self, PollStatus, PollType},
        poll_option, session,
    },
    repositories::{ExclusivePublish, PollRepository, SessionRepository},
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use crate::services::event_publisher::EventPublisherService;
use crate::services::session::ensure_owner;

/// Maximum number of options on a choice poll.
const MAX_OPTIONS: usize = 20;

/// Maximum length of an option text.
const MAX_OPTION_LEN: usize = 500;

/// Poll service for business logic.
#[derive(Clone)]
pub struct PollService {
    poll_repo: PollRepository,
    session_repo: SessionRepository,
    event_publisher: Option<EventPublisherService>,
    id_gen: IdGenerator,
    allow_concurrent_published: bool,
}

/// Input for creating a poll.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollInput {
    #[validate(length(min = 1, max = 2000))]
    pub question: String,

    #[serde(rename = "type")]
    pub poll_type: PollType,

    #[serde(default)]
    pub options: Vec<String>,
}

/// A poll together with its options, in position order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollWithOptions {
    #[serde(flatten)]
    pub poll: poll::Model,
    pub options: Vec<poll_option::Model>,
}

impl PollService {
    /// Create a new poll service.
    #[must_use]
    pub const fn new(
        poll_repo: PollRepository,
        session_repo: SessionRepository,
        polling: &PollingConfig,
    ) -> Self {
        Self {
            poll_repo,
            session_repo,
            event_publisher: None,
            id_gen: IdGenerator::new(),
            allow_concurrent_published: polling.allow_concurrent_published,
        }
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = Some(event_publisher);
    }

    /// Create a draft poll with its options in one transaction.
    pub async fn create(
        &self,
        session_id: &str,
        host_id: &str,
        input: CreatePollInput,
    ) -> AppResult<PollWithOptions> {
        input.validate()?;

        let session = self.session_repo.get_by_id(session_id).await?;
        ensure_owner(&session, host_id)?;

        let question = input.question.trim();
        if question.is_empty() {
            return Err(AppError::Validation("Question cannot be blank".to_string()));
        }
        let options = validate_options(input.poll_type, &input.options)?;

        let poll_id = self.id_gen.generate();
        let poll_model = poll::ActiveModel {
            id: Set(poll_id.clone()),
            session_id: Set(session.id.clone()),
            question: Set(question.to_string()),
            poll_type: Set(input.poll_type),
            status: Set(PollStatus::Draft),
            created_at: Set(Utc::now().into()),
            published_at: Set(None),
            closed_at: Set(None),
        };

        let option_models = options
            .into_iter()
            .zip(0i32..)
            .map(|(text, position)| poll_option::ActiveModel {
                id: Set(self.id_gen.generate()),
                poll_id: Set(poll_id.clone()),
                position: Set(position),
                text: Set(text),
            })
            .collect();

        let (poll, options) = self
            .poll_repo
            .create_with_options(poll_model, option_models)
            .await?;

        info!(poll_id = %poll.id, session_id = %poll.session_id, "Poll created");

        Ok(PollWithOptions { poll, options })
    }

    /// Publish a draft poll and announce it on the session channel.
    pub async fn publish(&self, poll_id: &str, host_id: &str) -> AppResult<PollWithOptions> {
        let (poll, _) = self.get_owned(poll_id, host_id).await?;

        if poll.status != PollStatus::Draft {
            return Err(invalid_transition(&poll, "publish"));
        }

        let outcome = if self.allow_concurrent_published {
            if self
                .poll_repo
                .transition(&poll.id, PollStatus::Draft, PollStatus::Published)
                .await?
            {
                ExclusivePublish::Published
            } else {
                ExclusivePublish::NotDraft
            }
        } else {
            self.poll_repo
                .publish_exclusive(&poll.id, &poll.session_id)
                .await?
        };

        match outcome {
            ExclusivePublish::Published => {}
            ExclusivePublish::NotDraft => {
                let current = self.poll_repo.get_by_id(&poll.id).await?;
                return Err(invalid_transition(&current, "publish"));
            }
            ExclusivePublish::SessionBusy => {
                return Err(AppError::InvalidState(
                    "Another poll in this session is already published".to_string(),
                ));
            }
        }

        let poll = self.poll_repo.get_by_id(&poll.id).await?;
        let options = self.poll_repo.find_options(&poll.id).await?;

        info!(poll_id = %poll.id, session_id = %poll.session_id, "Poll published");

        if let Some(ref event_publisher) = self.event_publisher
            && let Err(e) = event_publisher.publish_poll_published(&poll, &options).await
        {
            warn!(error = %e, poll_id = %poll.id, "Failed to publish poll published event");
        }

        Ok(PollWithOptions { poll, options })
    }

    /// Close a published poll. Closed polls accept no further responses.
    pub async fn close(&self, poll_id: &str, host_id: &str) -> AppResult<poll::Model> {
        let (poll, _) = self.get_owned(poll_id, host_id).await?;

        if poll.status != PollStatus::Published {
            return Err(invalid_transition(&poll, "close"));
        }

        if !self
            .poll_repo
            .transition(&poll.id, PollStatus::Published, PollStatus::Closed)
            .await?
        {
            let current = self.poll_repo.get_by_id(&poll.id).await?;
            return Err(invalid_transition(&current, "close"));
        }

        let poll = self.poll_repo.get_by_id(&poll.id).await?;
        info!(poll_id = %poll.id, session_id = %poll.session_id, "Poll closed");

        Ok(poll)
    }

    /// Currently published polls of the session behind a join code.
    pub async fn list_published(&self, code: &str) -> AppResult<Vec<PollWithOptions>> {
        let code = normalize_join_code(code);
        let session = self
            .session_repo
            .find_by_join_code(&code)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Session not found for code: {code}")))?;

        let polls = self.poll_repo.find_published_by_session(&session.id).await?;
        let ids: Vec<String> = polls.iter().map(|p| p.id.clone()).collect();
        let options = self.poll_repo.find_options_for_polls(&ids).await?;

        Ok(attach_options(polls, options))
    }

    /// Load a poll and its session, checking the host owns the session.
    pub async fn get_owned(
        &self,
        poll_id: &str,
        host_id: &str,
    ) -> AppResult<(poll::Model, session::Model)> {
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        let session = self.session_repo.get_by_id(&poll.session_id).await?;
        ensure_owner(&session, host_id)?;
        Ok((poll, session))
    }
}

fn invalid_transition(poll: &poll::Model, action: &str) -> AppError {
    AppError::InvalidState(format!(
        "Cannot {action} poll {} while it is {}",
        poll.id,
        status_name(poll.status)
    ))
}

/// Lower-case name of a status, as stored.
#[must_use]
pub const fn status_name(status: PollStatus) -> &'static str {
    match status {
        PollStatus::Draft => "draft",
        PollStatus::Published => "published",
        PollStatus::Closed => "closed",
    }
}

/// Check the option list against the poll type, returning trimmed texts.
fn validate_options(poll_type: PollType, options: &[String]) -> AppResult<Vec<String>> {
    if !poll_type.has_options() {
        if !options.is_empty() {
            return Err(AppError::Validation(
                "Open-ended polls cannot have options".to_string(),
            ));
        }
        return Ok(vec![]);
    }

    if options.is_empty() {
        return Err(AppError::Validation(
            "Choice polls need at least one option".to_string(),
        ));
    }
    if options.len() > MAX_OPTIONS {
        return Err(AppError::Validation(format!(
            "Poll cannot have more than {MAX_OPTIONS} options"
        )));
    }

    options
        .iter()
        .map(|text| {
            let text = text.trim();
            if text.is_empty() {
                Err(AppError::Validation("Option text cannot be blank".to_string()))
            } else if text.chars().count() > MAX_OPTION_LEN {
                Err(AppError::Validation(format!(
                    "Option text is too long (max {MAX_OPTION_LEN} chars)"
                )))
            } else {
                Ok(text.to_string())
            }
        })
        .collect()
}

/// Pair polls with their options, keeping poll order and option position order.
#[must_use]
pub fn attach_options(
    polls: Vec<poll::Model>,
    options: Vec<poll_option::Model>,
) -> Vec<PollWithOptions> {
    let mut by_poll: HashMap<String, Vec<poll_option::Model>> = HashMap::new();
    for option in options {
        by_poll.entry(option.poll_id.clone()).or_default().push(option);
    }

    polls
        .into_iter()
        .map(|poll| {
            let mut options = by_poll.remove(&poll.id).unwrap_or_default();
            options.sort_by_key(|o| o.position);
            PollWithOptions { poll, options }
        })
        .collect()
}
