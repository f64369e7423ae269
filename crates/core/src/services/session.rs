//! Session registry service.

use chrono::Utc;
use livepoll_common::{AppError, AppResult, IdGenerator, PollingConfig, normalize_join_code};
use livepoll_db::{
    entities::session,
    repositories::{PollRepository, SessionRepository},
};
use sea_orm::Set;
use serde::Deserialize;
use tracing::{info, warn};
use validator::Validate;

use crate::services::poll::{PollWithOptions, attach_options};

/// Session service for business logic.
#[derive(Clone)]
pub struct SessionService {
    session_repo: SessionRepository,
    poll_repo: PollRepository,
    id_gen: IdGenerator,
    join_code_length: usize,
    join_code_max_attempts: u32,
}

/// Input for creating a session.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionInput {
    #[validate(length(min = 1, max = 256))]
    pub name: String,
}

/// A session with all of its polls.
#[derive(Debug, Clone)]
pub struct SessionDetail {
    pub session: session::Model,
    pub polls: Vec<PollWithOptions>,
}

impl SessionService {
    /// Create a new session service.
    #[must_use]
    pub const fn new(
        session_repo: SessionRepository,
        poll_repo: PollRepository,
        polling: &PollingConfig,
    ) -> Self {
        Self {
            session_repo,
            poll_repo,
            id_gen: IdGenerator::new(),
            join_code_length: polling.join_code_length,
            join_code_max_attempts: polling.join_code_max_attempts,
        }
    }

    /// Create a session with a fresh join code.
    ///
    /// Each attempt draws a new code and lets the unique index decide.
    pub async fn create(&self, host_id: &str, input: CreateSessionInput) -> AppResult<session::Model> {
        input.validate()?;

        let name = input.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Session name cannot be blank".to_string()));
        }

        for attempt in 1..=self.join_code_max_attempts {
            let join_code = self.id_gen.generate_join_code(self.join_code_length);

            let model = session::ActiveModel {
                id: Set(self.id_gen.generate()),
                host_id: Set(host_id.to_string()),
                join_code: Set(join_code.clone()),
                name: Set(name.to_string()),
                created_at: Set(Utc::now().into()),
            };

            if let Some(session) = self.session_repo.try_create(model).await? {
                info!(session_id = %session.id, host_id = %host_id, "Session created");
                return Ok(session);
            }

            warn!(attempt, join_code = %join_code, "Join code collision, retrying");
        }

        Err(AppError::Internal(format!(
            "Could not allocate a unique join code after {} attempts",
            self.join_code_max_attempts
        )))
    }

    /// Resolve a join code to its session.
    pub async fn lookup_by_code(&self, code: &str) -> AppResult<session::Model> {
        let code = normalize_join_code(code);
        if code.is_empty() {
            return Err(AppError::Validation("Join code is required".to_string()));
        }

        self.session_repo
            .find_by_join_code(&code)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Session not found for code: {code}")))
    }

    /// Get a session by ID.
    pub async fn get(&self, session_id: &str) -> AppResult<session::Model> {
        self.session_repo.get_by_id(session_id).await
    }

    /// List the sessions of a host.
    pub async fn list_for_host(&self, host_id: &str) -> AppResult<Vec<session::Model>> {
        self.session_repo.find_by_host(host_id).await
    }

    /// Get a session the host owns.
    pub async fn get_owned(&self, session_id: &str, host_id: &str) -> AppResult<session::Model> {
        let session = self.session_repo.get_by_id(session_id).await?;
        ensure_owner(&session, host_id)?;
        Ok(session)
    }

    /// Get a session the host owns, with every poll in it.
    pub async fn get_for_host(&self, session_id: &str, host_id: &str) -> AppResult<SessionDetail> {
        let session = self.get_owned(session_id, host_id).await?;

        let polls = self.poll_repo.find_by_session(&session.id).await?;
        let ids: Vec<String> = polls.iter().map(|p| p.id.clone()).collect();
        let options = self.poll_repo.find_options_for_polls(&ids).await?;

        Ok(SessionDetail {
            session,
            polls: attach_options(polls, options),
        })
    }
}

/// Fail with `Forbidden` unless the host owns the session.
pub fn ensure_owner(session: &session::Model, host_id: &str) -> AppResult<()> {
    if session.host_id == host_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Session belongs to another host".to_string(),
        ))
    }
}
