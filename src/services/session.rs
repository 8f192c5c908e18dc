//! Session issuance and validation.
//!
//! DESIGN
//! ======
//! Tokens are 32 random bytes, hex-encoded, handed to the client exactly
//! once. Only a SHA-256 digest is stored, so a leaked session table yields no
//! usable tokens.
//!
//! TRADE-OFFS
//! ==========
//! Expiry is lazy: expired rows are treated as absent and evicted at lookup.
//! This favors a sweep-free design over prompt reclamation of dead rows.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt::Write;
use std::sync::{Arc, Mutex};

use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use time::{Duration, OffsetDateTime};

const DEFAULT_SESSION_TTL_SECS: i64 = 86_400;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

// =============================================================================
// TOKENS
// =============================================================================

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// SHA-256 digest of a token, hex-encoded. This is the storage key; the
/// cleartext token is never persisted.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    bytes_to_hex(hasher.finalize().as_slice())
}

/// Session row as persisted.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub token_hash: String,
    pub account_email: String,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

/// Issued session returned to the caller — the only place the cleartext
/// token exists.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

// =============================================================================
// STORE TRAIT
// =============================================================================

#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert if the token hash is absent. Returns `false` on collision so
    /// the issuer can regenerate.
    async fn insert(&self, record: SessionRecord) -> Result<bool, SessionError>;

    /// Look up a live session's account email. Expired entries are evicted
    /// and reported absent.
    async fn lookup(&self, token_hash: &str, now: OffsetDateTime) -> Result<Option<String>, SessionError>;

    /// Remove a session if present; no-op otherwise.
    async fn remove(&self, token_hash: &str) -> Result<(), SessionError>;
}

// =============================================================================
// POSTGRES STORE
// =============================================================================

pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, record: SessionRecord) -> Result<bool, SessionError> {
        let result = sqlx::query(
            r"INSERT INTO sessions (token_hash, account_email, issued_at, expires_at)
              VALUES ($1, $2, $3, $4)
              ON CONFLICT (token_hash) DO NOTHING",
        )
        .bind(&record.token_hash)
        .bind(&record.account_email)
        .bind(record.issued_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn lookup(&self, token_hash: &str, now: OffsetDateTime) -> Result<Option<String>, SessionError> {
        let row = sqlx::query("SELECT account_email, expires_at FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let expires_at: OffsetDateTime = row.get("expires_at");
        if now > expires_at {
            sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
                .bind(token_hash)
                .execute(&self.pool)
                .await?;
            return Ok(None);
        }
        Ok(Some(row.get("account_email")))
    }

    async fn remove(&self, token_hash: &str) -> Result<(), SessionError> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

/// In-memory session store for local development and tests.
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, SessionRecord>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self { sessions: Mutex::new(HashMap::new()) }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, record: SessionRecord) -> Result<bool, SessionError> {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match sessions.entry(record.token_hash.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(true)
            }
        }
    }

    async fn lookup(&self, token_hash: &str, now: OffsetDateTime) -> Result<Option<String>, SessionError> {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some((email, expires_at)) = sessions
            .get(token_hash)
            .map(|r| (r.account_email.clone(), r.expires_at))
        else {
            return Ok(None);
        };
        if now > expires_at {
            sessions.remove(token_hash);
            return Ok(None);
        }
        Ok(Some(email))
    }

    async fn remove(&self, token_hash: &str) -> Result<(), SessionError> {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        sessions.remove(token_hash);
        Ok(())
    }
}

// =============================================================================
// ISSUER
// =============================================================================

/// Issues, validates, and revokes opaque session tokens.
#[derive(Clone)]
pub struct SessionIssuer {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
}

impl SessionIssuer {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Construct with the TTL from `SESSION_TTL_SECS` (default 24 hours).
    #[must_use]
    pub fn from_env(store: Arc<dyn SessionStore>) -> Self {
        let ttl_secs = std::env::var("SESSION_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_SESSION_TTL_SECS);
        Self::new(store, Duration::seconds(ttl_secs))
    }

    /// Issue a session for the account, returning the cleartext token and
    /// its expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store rejects the insert.
    pub async fn issue(&self, account_email: &str) -> Result<IssuedSession, SessionError> {
        self.issue_at(account_email, OffsetDateTime::now_utc()).await
    }

    /// Internal: issue with an explicit timestamp (for testing).
    pub(crate) async fn issue_at(
        &self,
        account_email: &str,
        now: OffsetDateTime,
    ) -> Result<IssuedSession, SessionError> {
        loop {
            let token = generate_token();
            let record = SessionRecord {
                token_hash: hash_token(&token),
                account_email: account_email.to_owned(),
                issued_at: now,
                expires_at: now + self.ttl,
            };
            let expires_at = record.expires_at;
            // A 256-bit collision is astronomically unlikely; the store's
            // insert-if-absent still catches it and we regenerate.
            if self.store.insert(record).await? {
                return Ok(IssuedSession { token, expires_at });
            }
        }
    }

    /// Resolve a token to its account email, or `None` if unknown or
    /// expired.
    ///
    /// # Errors
    ///
    /// Returns an error only on store failure; an expired or unknown token
    /// is `Ok(None)`.
    pub async fn validate(&self, token: &str) -> Result<Option<String>, SessionError> {
        self.validate_at(token, OffsetDateTime::now_utc()).await
    }

    pub(crate) async fn validate_at(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<Option<String>, SessionError> {
        self.store.lookup(&hash_token(token), now).await
    }

    /// Revoke a token. Idempotent: revoking an unknown or expired token is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns an error only on store failure.
    pub async fn revoke(&self, token: &str) -> Result<(), SessionError> {
        self.store.remove(&hash_token(token)).await
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
