//! Participant registry service.

use chrono::Utc;
use livepoll_common::{AppError, AppResult, IdGenerator, normalize_join_code};
use livepoll_db::{
    entities::{participant, session},
    repositories::{ParticipantRepository, SessionRepository},
};
use sea_orm::Set;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::services::host::normalize_email;

/// Participant service for business logic.
#[derive(Clone)]
pub struct ParticipantService {
    participant_repo: ParticipantRepository,
    session_repo: SessionRepository,
    id_gen: IdGenerator,
}

/// Input for joining a session.
#[derive(Debug, Deserialize, Validate)]
pub struct JoinSessionInput {
    #[validate(length(min = 1, max = 128))]
    pub name: String,

    #[validate(email)]
    pub email: String,
}

impl ParticipantService {
    /// Create a new participant service.
    #[must_use]
    pub const fn new(participant_repo: ParticipantRepository, session_repo: SessionRepository) -> Self {
        Self {
            participant_repo,
            session_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Join a session, or return the existing participant with this email.
    pub async fn join(
        &self,
        session_id: &str,
        input: JoinSessionInput,
    ) -> AppResult<participant::Model> {
        let email = normalize_email(&input.email);
        let input = JoinSessionInput {
            name: input.name.trim().to_string(),
            email,
        };
        input.validate()?;

        let model = participant::ActiveModel {
            id: Set(self.id_gen.generate()),
            session_id: Set(session_id.to_string()),
            name: Set(input.name),
            email: Set(input.email.clone()),
            created_at: Set(Utc::now().into()),
        };

        let (participant, created) = self
            .participant_repo
            .join(model, session_id, &input.email)
            .await?;

        if created {
            info!(participant_id = %participant.id, session_id = %session_id, "Participant joined");
        }

        Ok(participant)
    }

    /// Resolve a join code and join its session.
    pub async fn join_by_code(
        &self,
        code: &str,
        input: JoinSessionInput,
    ) -> AppResult<(session::Model, participant::Model)> {
        let code = normalize_join_code(code);
        let session = self
            .session_repo
            .find_by_join_code(&code)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Session not found for code: {code}")))?;

        let participant = self.join(&session.id, input).await?;
        Ok((session, participant))
    }

    /// Get a participant by ID.
    pub async fn get(&self, id: &str) -> AppResult<participant::Model> {
        self.participant_repo.get_by_id(id).await
    }
}
