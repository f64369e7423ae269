//! Response repository.

use std::sync::Arc;

use crate::db_err;
use crate::entities::{Poll, Response, poll::PollStatus, response};
use livepoll_common::{AppError, AppResult, ResubmissionPolicy};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait, sea_query::OnConflict,
};

/// Result of a submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The response was stored; this is the row as it now exists.
    Stored(response::Model),
    /// The poll does not exist.
    PollMissing,
    /// The poll exists but is not accepting responses.
    PollNotOpen(PollStatus),
    /// A response already existed and the policy keeps the first one.
    Duplicate,
}

/// Response repository for database operations.
#[derive(Clone)]
pub struct ResponseRepository {
    db: Arc<DatabaseConnection>,
}

impl ResponseRepository {
    /// Create a new response repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Store a response if the poll is published.
    ///
    /// The status check and the write happen in one transaction that holds a
    /// shared lock on the poll row, so a concurrent close either waits for
    /// this write or makes it fail the status check. There is never more than
    /// one row per `(poll, participant)`.
    pub async fn submit(
        &self,
        model: response::ActiveModel,
        poll_id: &str,
        participant_id: &str,
        policy: ResubmissionPolicy,
    ) -> AppResult<SubmitOutcome> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let poll = Poll::find_by_id(poll_id)
            .lock_shared()
            .one(&txn)
            .await
            .map_err(db_err)?;

        let Some(poll) = poll else {
            txn.rollback().await.map_err(db_err)?;
            return Ok(SubmitOutcome::PollMissing);
        };

        if poll.status != PollStatus::Published {
            txn.rollback().await.map_err(db_err)?;
            return Ok(SubmitOutcome::PollNotOpen(poll.status));
        }

        let on_conflict = match policy {
            ResubmissionPolicy::Overwrite => {
                OnConflict::columns([response::Column::PollId, response::Column::ParticipantId])
                    .update_columns([response::Column::Payload, response::Column::UpdatedAt])
                    .to_owned()
            }
            ResubmissionPolicy::Reject => {
                OnConflict::columns([response::Column::PollId, response::Column::ParticipantId])
                    .do_nothing()
                    .to_owned()
            }
        };

        let written = Response::insert(model)
            .on_conflict(on_conflict)
            .exec_without_returning(&txn)
            .await
            .map_err(db_err)?;

        if written == 0 {
            txn.rollback().await.map_err(db_err)?;
            return Ok(SubmitOutcome::Duplicate);
        }

        let stored = Self::find_in(&txn, poll_id, participant_id).await?;
        txn.commit().await.map_err(db_err)?;

        Ok(SubmitOutcome::Stored(stored))
    }

    async fn find_in(
        txn: &DatabaseTransaction,
        poll_id: &str,
        participant_id: &str,
    ) -> AppResult<response::Model> {
        Response::find()
            .filter(response::Column::PollId.eq(poll_id))
            .filter(response::Column::ParticipantId.eq(participant_id))
            .one(txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| {
                AppError::Internal(format!("Response row missing after write for poll {poll_id}"))
            })
    }

    /// List all responses to a poll, oldest first.
    pub async fn find_by_poll(&self, poll_id: &str) -> AppResult<Vec<response::Model>> {
        Response::find()
            .filter(response::Column::PollId.eq(poll_id))
            .order_by_asc(response::Column::CreatedAt)
            .order_by_asc(response::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }
}
