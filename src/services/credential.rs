//! Credential storage — account records and password verification.
//!
//! DESIGN
//! ======
//! Accounts are keyed by normalized email and hold an Argon2id PHC hash; the
//! per-account salt is embedded in the PHC string. Creation is
//! insert-if-absent at the storage layer, so two concurrent registrations for
//! the same email cannot both succeed. Verification for an unknown email
//! burns a hash against a fixed decoy so lookup cost does not reveal whether
//! the account exists.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, OnceLock};

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use uuid::Uuid;

/// Password hashed on lookup misses, so a miss costs the same as a mismatch.
const DECOY_PASSWORD: &str = "decoy-password-for-unknown-accounts";

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("invalid email")]
    InvalidEmail,
    #[error("account already exists")]
    DuplicateAccount,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Account record as exposed to callers. The password hash never leaves the
/// store.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub created_at: OffsetDateTime,
}

// =============================================================================
// EMAIL NORMALIZATION
// =============================================================================

/// Normalize an email for use as a lookup key: trim, ASCII-lowercase, and
/// require exactly one `@` with non-empty local and domain parts.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    if normalized.is_empty() || !normalized.contains('@') {
        return None;
    }
    let parts = normalized.split('@').collect::<Vec<_>>();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return None;
    }
    Some(normalized)
}

// =============================================================================
// PASSWORD HASHING
// =============================================================================

/// Hash a password with Argon2id and a fresh random salt, returning the PHC
/// string.
///
/// # Errors
///
/// Returns `CredentialError::Hash` if the KDF rejects its inputs.
pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CredentialError::Hash(e.to_string()))
}

/// Verify a password against a stored PHC hash. The comparison inside the
/// argon2 crate is constant-time.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// PHC hash verified on lookup misses. Computed once, lazily.
fn decoy_hash() -> &'static str {
    static DECOY: OnceLock<String> = OnceLock::new();
    DECOY.get_or_init(|| hash_password(DECOY_PASSWORD).unwrap_or_default())
}

/// Spend one KDF verification without an account, keeping miss and mismatch
/// paths comparable in cost.
fn burn_decoy_verification(password: &str) {
    let _ = verify_password(password, decoy_hash());
}

// =============================================================================
// STORE TRAIT
// =============================================================================

/// Durable mapping from normalized email to account + password hash.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Create an account. Insert-if-absent on the normalized email: exactly
    /// one of two concurrent creates for the same email succeeds.
    async fn create(&self, email: &str, password: &str) -> Result<Account, CredentialError>;

    /// Check a password. Unknown emails still cost one hash verification and
    /// report `false`, not an error.
    async fn verify(&self, email: &str, password: &str) -> Result<bool, CredentialError>;

    /// Whether an account exists for the normalized email.
    async fn exists(&self, email: &str) -> Result<bool, CredentialError>;
}

// =============================================================================
// POSTGRES STORE
// =============================================================================

pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create(&self, email: &str, password: &str) -> Result<Account, CredentialError> {
        let normalized = normalize_email(email).ok_or(CredentialError::InvalidEmail)?;
        // Hash before touching the database; the insert itself is the atomic
        // commit point.
        let password_hash = hash_password(password)?;

        let row = sqlx::query(
            r"INSERT INTO accounts (email, password_hash)
              VALUES ($1, $2)
              ON CONFLICT (email) DO NOTHING
              RETURNING id, email, created_at",
        )
        .bind(&normalized)
        .bind(&password_hash)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(CredentialError::DuplicateAccount);
        };
        Ok(Account {
            id: row.get("id"),
            email: row.get("email"),
            created_at: row.get("created_at"),
        })
    }

    async fn verify(&self, email: &str, password: &str) -> Result<bool, CredentialError> {
        let Some(normalized) = normalize_email(email) else {
            burn_decoy_verification(password);
            return Ok(false);
        };
        let row = sqlx::query("SELECT password_hash FROM accounts WHERE email = $1")
            .bind(&normalized)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let stored: String = row.get("password_hash");
                Ok(verify_password(password, &stored))
            }
            None => {
                burn_decoy_verification(password);
                Ok(false)
            }
        }
    }

    async fn exists(&self, email: &str) -> Result<bool, CredentialError> {
        let Some(normalized) = normalize_email(email) else {
            return Ok(false);
        };
        let row = sqlx::query("SELECT 1 AS present FROM accounts WHERE email = $1")
            .bind(&normalized)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

/// Account row held by the in-memory store.
#[derive(Debug, Clone)]
struct StoredAccount {
    account: Account,
    password_hash: String,
}

/// In-memory credential store for local development and tests.
pub struct MemoryCredentialStore {
    accounts: Mutex<HashMap<String, StoredAccount>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self { accounts: Mutex::new(HashMap::new()) }
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn create(&self, email: &str, password: &str) -> Result<Account, CredentialError> {
        let normalized = normalize_email(email).ok_or(CredentialError::InvalidEmail)?;
        // Hash outside the lock; the record is published whole under it.
        let password_hash = hash_password(password)?;
        let record = StoredAccount {
            account: Account {
                id: Uuid::new_v4(),
                email: normalized.clone(),
                created_at: OffsetDateTime::now_utc(),
            },
            password_hash,
        };

        let mut accounts = self
            .accounts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match accounts.entry(normalized) {
            Entry::Occupied(_) => Err(CredentialError::DuplicateAccount),
            Entry::Vacant(slot) => {
                let account = record.account.clone();
                slot.insert(record);
                Ok(account)
            }
        }
    }

    async fn verify(&self, email: &str, password: &str) -> Result<bool, CredentialError> {
        let stored = normalize_email(email).and_then(|normalized| {
            let accounts = self
                .accounts
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            accounts.get(&normalized).map(|r| r.password_hash.clone())
        });
        match stored {
            Some(hash) => Ok(verify_password(password, &hash)),
            None => {
                burn_decoy_verification(password);
                Ok(false)
            }
        }
    }

    async fn exists(&self, email: &str) -> Result<bool, CredentialError> {
        let Some(normalized) = normalize_email(email) else {
            return Ok(false);
        };
        let accounts = self
            .accounts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(accounts.contains_key(&normalized))
    }
}

#[cfg(test)]
#[path = "credential_test.rs"]
mod tests;
