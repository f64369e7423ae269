//! Host repository.

use std::sync::Arc;

use crate::entities::{Host, host};
use crate::{db_err, is_unique_violation};
use livepoll_common::{AppError, AppResult};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

/// Host repository for database operations.
#[derive(Clone)]
pub struct HostRepository {
    db: Arc<DatabaseConnection>,
}

impl HostRepository {
    /// Create a new host repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a host by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<host::Model>> {
        Host::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Find a host by (already normalised) email.
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<host::Model>> {
        Host::find()
            .filter(host::Column::Email.eq(email))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Find a host by access token.
    pub async fn find_by_token(&self, token: &str) -> AppResult<Option<host::Model>> {
        Host::find()
            .filter(host::Column::Token.eq(token))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Create a new host. A duplicate email is reported as a conflict.
    pub async fn create(&self, model: host::ActiveModel) -> AppResult<host::Model> {
        model.insert(self.db.as_ref()).await.map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("A host with this email already exists".to_string())
            } else {
                db_err(e)
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, RuntimeErr, Set};

    fn create_test_host(id: &str, email: &str) -> host::Model {
        host::Model {
            id: id.to_string(),
            email: email.to_string(),
            name: "Host".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            token: "token".to_string(),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_token() {
        let host = create_test_host("h1", "h@x.com");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[host.clone()]])
                .into_connection(),
        );

        let repo = HostRepository::new(db);
        let found = repo.find_by_token("token").await.unwrap();

        assert_eq!(found.unwrap().id, "h1");
    }

    #[tokio::test]
    async fn test_find_by_email_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<host::Model>::new()])
                .into_connection(),
        );

        let repo = HostRepository::new(db);
        assert!(repo.find_by_email("nobody@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_duplicate_email_is_conflict() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_errors([DbErr::Query(RuntimeErr::Internal(
                    "duplicate key value violates unique constraint \"host_email_key\"".to_string(),
                ))])
                .into_connection(),
        );

        let repo = HostRepository::new(db);
        let model = host::ActiveModel {
            id: Set("h1".to_string()),
            email: Set("h@x.com".to_string()),
            name: Set("Host".to_string()),
            password_hash: Set("hash".to_string()),
            token: Set("token".to_string()),
            created_at: Set(Utc::now().into()),
        };

        let result = repo.create(model).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }
}
