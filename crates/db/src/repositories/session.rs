//! Session repository.

use std::sync::Arc;

use crate::entities::{Session, session};
use crate::{db_err, is_unique_violation};
use livepoll_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};

/// Session repository for database operations.
#[derive(Clone)]
pub struct SessionRepository {
    db: Arc<DatabaseConnection>,
}

impl SessionRepository {
    /// Create a new session repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a session by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<session::Model>> {
        Session::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Get a session by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<session::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Session not found: {id}")))
    }

    /// Find a session by its (normalised) join code.
    pub async fn find_by_join_code(&self, code: &str) -> AppResult<Option<session::Model>> {
        Session::find()
            .filter(session::Column::JoinCode.eq(code))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// List a host's sessions, oldest first.
    pub async fn find_by_host(&self, host_id: &str) -> AppResult<Vec<session::Model>> {
        Session::find()
            .filter(session::Column::HostId.eq(host_id))
            .order_by_asc(session::Column::CreatedAt)
            .order_by_asc(session::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Try to insert a session.
    ///
    /// Returns `None` when the unique index rejected the row, i.e. the join
    /// code is already taken. The insert is the only arbiter; no prior
    /// existence check is made.
    pub async fn try_create(&self, model: session::ActiveModel) -> AppResult<Option<session::Model>> {
        match model.insert(self.db.as_ref()).await {
            Ok(session) => Ok(Some(session)),
            Err(e) if is_unique_violation(&e) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, RuntimeErr, Set};

    fn create_test_session(id: &str, host_id: &str, code: &str) -> session::Model {
        session::Model {
            id: id.to_string(),
            host_id: host_id.to_string(),
            join_code: code.to_string(),
            name: "Lecture 1".to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn active(code: &str) -> session::ActiveModel {
        session::ActiveModel {
            id: Set("s1".to_string()),
            host_id: Set("h1".to_string()),
            join_code: Set(code.to_string()),
            name: Set("Lecture 1".to_string()),
            created_at: Set(Utc::now().into()),
        }
    }

    #[tokio::test]
    async fn test_find_by_join_code() {
        let session = create_test_session("s1", "h1", "ABC123");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[session.clone()]])
                .into_connection(),
        );

        let repo = SessionRepository::new(db);
        let found = repo.find_by_join_code("ABC123").await.unwrap().unwrap();
        assert_eq!(found.id, "s1");
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<session::Model>::new()])
                .into_connection(),
        );

        let repo = SessionRepository::new(db);
        let result = repo.get_by_id("missing").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_find_by_host() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    create_test_session("s1", "h1", "AAAAAA"),
                    create_test_session("s2", "h1", "BBBBBB"),
                ]])
                .into_connection(),
        );

        let repo = SessionRepository::new(db);
        let sessions = repo.find_by_host("h1").await.unwrap();
        assert_eq!(sessions.len(), 2);
    }

    #[tokio::test]
    async fn test_try_create_inserted() {
        let session = create_test_session("s1", "h1", "ABC123");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[session.clone()]])
                .into_connection(),
        );

        let repo = SessionRepository::new(db);
        let created = repo.try_create(active("ABC123")).await.unwrap();
        assert_eq!(created.unwrap().join_code, "ABC123");
    }

    #[tokio::test]
    async fn test_try_create_collision_returns_none() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_errors([DbErr::Query(RuntimeErr::Internal(
                    "duplicate key value violates unique constraint \"idx_session_join_code\""
                        .to_string(),
                ))])
                .into_connection(),
        );

        let repo = SessionRepository::new(db);
        assert!(repo.try_create(active("ABC123")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_try_create_other_error_propagates() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_errors([DbErr::Query(RuntimeErr::Internal(
                    "connection reset".to_string(),
                ))])
                .into_connection(),
        );

        let repo = SessionRepository::new(db);
        let result = repo.try_create(active("ABC123")).await;
        assert!(matches!(result, Err(AppError::Database(_))));
    }
}
