//! Host account service.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use livepoll_common::{AppError, AppResult, IdGenerator};
use livepoll_db::{entities::host, repositories::HostRepository};
use sea_orm::Set;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

/// Host service for registration and authentication.
#[derive(Clone)]
pub struct HostService {
    host_repo: HostRepository,
    id_gen: IdGenerator,
}

/// Input for registering a host.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterHostInput {
    #[validate(length(min = 3, max = 128))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Input for logging in.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

impl HostService {
    /// Create a new host service.
    #[must_use]
    pub const fn new(host_repo: HostRepository) -> Self {
        Self {
            host_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a new host. The returned model carries the access token.
    pub async fn register(&self, input: RegisterHostInput) -> AppResult<host::Model> {
        input.validate()?;

        let password_hash = hash_password(&input.password)?;

        let model = host::ActiveModel {
            id: Set(self.id_gen.generate()),
            email: Set(normalize_email(&input.email)),
            name: Set(input.name.trim().to_string()),
            password_hash: Set(password_hash),
            token: Set(self.id_gen.generate_token()),
            created_at: Set(Utc::now().into()),
        };

        // The unique index on email decides; no pre-check.
        let host = self.host_repo.create(model).await?;
        info!(host_id = %host.id, "Host registered");

        Ok(host)
    }

    /// Exchange email and password for the host (and its token).
    pub async fn login(&self, input: LoginInput) -> AppResult<host::Model> {
        input.validate()?;

        let host = self
            .host_repo
            .find_by_email(&normalize_email(&input.email))
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(&input.password, &host.password_hash)? {
            return Err(AppError::Unauthorized);
        }

        Ok(host)
    }

    /// Resolve a bearer token to its host.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<host::Model> {
        self.host_repo
            .find_by_token(token)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Get a host by ID.
    pub async fn get(&self, id: &str) -> AppResult<host::Model> {
        self.host_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Host not found: {id}")))
    }
}

/// Trim and lower-case an email address.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
