//! Participant repository.

use std::sync::Arc;

use crate::db_err;
use crate::entities::{Participant, participant};
use livepoll_common::{AppError, AppResult};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, sea_query::OnConflict};

/// Participant repository for database operations.
#[derive(Clone)]
pub struct ParticipantRepository {
    db: Arc<DatabaseConnection>,
}

impl ParticipantRepository {
    /// Create a new participant repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a participant by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<participant::Model>> {
        Participant::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Get a participant by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<participant::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Participant not found: {id}")))
    }

    /// Find a participant by session and (normalised) email.
    pub async fn find_by_session_and_email(
        &self,
        session_id: &str,
        email: &str,
    ) -> AppResult<Option<participant::Model>> {
        Participant::find()
            .filter(participant::Column::SessionId.eq(session_id))
            .filter(participant::Column::Email.eq(email))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Find several participants at once.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<participant::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        Participant::find()
            .filter(participant::Column::Id.is_in(ids.iter().cloned()))
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Insert the participant unless `(session_id, email)` already exists,
    /// then return the stored row.
    ///
    /// The boolean is `true` when this call created the row. Concurrent joins
    /// with the same key all resolve to the single surviving row, and the
    /// first stored name wins.
    pub async fn join(
        &self,
        model: participant::ActiveModel,
        session_id: &str,
        email: &str,
    ) -> AppResult<(participant::Model, bool)> {
        let inserted = Participant::insert(model)
            .on_conflict(
                OnConflict::columns([participant::Column::SessionId, participant::Column::Email])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(db_err)?;

        let stored = self
            .find_by_session_and_email(session_id, email)
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Participant row missing after join for session {session_id}"
                ))
            })?;

        Ok((stored, inserted > 0))
    }
}
