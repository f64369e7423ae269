//! Poll repository.

use std::sync::Arc;

use crate::db_err;
use crate::entities::{Poll, PollOption, Session, poll, poll::PollStatus, poll_option};
use chrono::Utc;
use livepoll_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait, TryIntoModel, sea_query::Expr,
};

/// Result of publishing a poll in a session that allows one published poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusivePublish {
    /// The poll moved from draft to published.
    Published,
    /// The poll was no longer a draft.
    NotDraft,
    /// Another poll of the session is already published.
    SessionBusy,
}

/// Poll repository for database operations.
#[derive(Clone)]
pub struct PollRepository {
    db: Arc<DatabaseConnection>,
}

impl PollRepository {
    /// Create a new poll repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a poll by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<poll::Model>> {
        Poll::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Get a poll by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<poll::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Poll not found: {id}")))
    }

    /// List every poll of a session in creation order.
    pub async fn find_by_session(&self, session_id: &str) -> AppResult<Vec<poll::Model>> {
        Poll::find()
            .filter(poll::Column::SessionId.eq(session_id))
            .order_by_asc(poll::Column::CreatedAt)
            .order_by_asc(poll::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// List the published polls of a session, earliest published first.
    pub async fn find_published_by_session(
        &self,
        session_id: &str,
    ) -> AppResult<Vec<poll::Model>> {
        Poll::find()
            .filter(poll::Column::SessionId.eq(session_id))
            .filter(poll::Column::Status.eq(PollStatus::Published))
            .order_by_asc(poll::Column::PublishedAt)
            .order_by_asc(poll::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Insert a poll and its options atomically.
    ///
    /// Either the poll and every option become visible together or nothing
    /// is stored.
    pub async fn create_with_options(
        &self,
        poll: poll::ActiveModel,
        options: Vec<poll_option::ActiveModel>,
    ) -> AppResult<(poll::Model, Vec<poll_option::Model>)> {
        let stored_options = options
            .iter()
            .cloned()
            .map(TryIntoModel::try_into_model)
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        let txn = self.db.begin().await.map_err(db_err)?;

        let poll = poll.insert(&txn).await.map_err(db_err)?;

        if !options.is_empty() {
            PollOption::insert_many(options)
                .exec_without_returning(&txn)
                .await
                .map_err(db_err)?;
        }

        txn.commit().await.map_err(db_err)?;

        Ok((poll, stored_options))
    }

    /// Move a poll from `from` to `to` if it is still in `from`.
    ///
    /// Returns `false` when the poll was not in `from` (or does not exist);
    /// concurrent callers racing on the same transition see exactly one
    /// `true`.
    pub async fn transition(&self, id: &str, from: PollStatus, to: PollStatus) -> AppResult<bool> {
        Self::transition_in(self.db.as_ref(), id, from, to)
            .await
            .map_err(db_err)
    }

    /// Publish a draft poll unless another poll of its session is published.
    ///
    /// The session row is locked for the whole check-and-update, so two
    /// publishes in one session run one after the other and the second sees
    /// the first one's poll.
    pub async fn publish_exclusive(
        &self,
        id: &str,
        session_id: &str,
    ) -> AppResult<ExclusivePublish> {
        let txn = self.db.begin().await.map_err(db_err)?;

        Session::find_by_id(session_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_err)?;

        let other = Poll::find()
            .filter(poll::Column::SessionId.eq(session_id))
            .filter(poll::Column::Status.eq(PollStatus::Published))
            .one(&txn)
            .await
            .map_err(db_err)?;

        if other.is_some() {
            txn.rollback().await.map_err(db_err)?;
            return Ok(ExclusivePublish::SessionBusy);
        }

        let applied = Self::transition_in(&txn, id, PollStatus::Draft, PollStatus::Published)
            .await
            .map_err(db_err)?;

        if !applied {
            txn.rollback().await.map_err(db_err)?;
            return Ok(ExclusivePublish::NotDraft);
        }

        txn.commit().await.map_err(db_err)?;

        Ok(ExclusivePublish::Published)
    }

    async fn transition_in<C: ConnectionTrait>(
        conn: &C,
        id: &str,
        from: PollStatus,
        to: PollStatus,
    ) -> Result<bool, DbErr> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();

        let mut update = Poll::update_many()
            .col_expr(poll::Column::Status, Expr::value(to))
            .filter(poll::Column::Id.eq(id))
            .filter(poll::Column::Status.eq(from));

        update = match to {
            PollStatus::Published => update.col_expr(poll::Column::PublishedAt, Expr::value(now)),
            PollStatus::Closed => update.col_expr(poll::Column::ClosedAt, Expr::value(now)),
            PollStatus::Draft => update,
        };

        let result = update.exec(conn).await?;

        Ok(result.rows_affected == 1)
    }

    /// List a poll's options by position.
    pub async fn find_options(&self, poll_id: &str) -> AppResult<Vec<poll_option::Model>> {
        PollOption::find()
            .filter(poll_option::Column::PollId.eq(poll_id))
            .order_by_asc(poll_option::Column::Position)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// List options of several polls, grouped by poll and ordered by position.
    pub async fn find_options_for_polls(
        &self,
        poll_ids: &[String],
    ) -> AppResult<Vec<poll_option::Model>> {
        if poll_ids.is_empty() {
            return Ok(vec![]);
        }

        PollOption::find()
            .filter(poll_option::Column::PollId.is_in(poll_ids.iter().cloned()))
            .order_by_asc(poll_option::Column::PollId)
            .order_by_asc(poll_option::Column::Position)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }
}
