//! ID generation utilities.

use rand::Rng;
use ulid::Ulid;
use uuid::Uuid;

/// Alphabet for session join codes. Upper-case only, so lookups can
/// normalise user input by upper-casing it.
const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// ID generator for entities.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new ULID-based ID.
    ///
    /// ULIDs are lexicographically sortable, so ordering by ID is ordering
    /// by creation time.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate a cryptographically secure random token.
    #[must_use]
    pub fn generate_token(&self) -> String {
        // No time component for tokens
        Uuid::new_v4().simple().to_string()
    }

    /// Generate a random upper-case alphanumeric join code.
    ///
    /// Uniqueness is not checked here; the database unique index decides.
    #[must_use]
    pub fn generate_join_code(&self, len: usize) -> String {
        let mut rng = rand::thread_rng();
        (0..len)
            .map(|_| {
                let idx = rng.gen_range(0..JOIN_CODE_ALPHABET.len());
                char::from(JOIN_CODE_ALPHABET[idx])
            })
            .collect()
    }
}

/// Normalise a join code typed by a participant.
#[must_use]
pub fn normalize_join_code(code: &str) -> String {
    code.trim().to_uppercase()
}
