//! Authentication service — registration, login, logout, validation.
//!
//! ARCHITECTURE
//! ============
//! Stateless per request: every call validates its input, consults the
//! credential store, and classifies failures into a closed taxonomy. Login
//! collapses "no such account" and "wrong password" into one error code so
//! the API never reveals whether an email is registered; registration is the
//! single deliberate exception (`EmailInUse`), since the caller is actively
//! claiming that address.

use std::sync::Arc;

use crate::rate_limit::{LoginThrottle, ThrottleError};
use crate::services::credential::{CredentialError, CredentialStore, normalize_email};
use crate::services::session::{IssuedSession, SessionError, SessionIssuer};

const DEFAULT_PASSWORD_MIN_LENGTH: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email")]
    InvalidEmail,
    #[error("weak password")]
    WeakPassword,
    #[error("email already in use")]
    EmailInUse,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("too many failed attempts")]
    TooManyAttempts,
    /// Storage-level failure. Logged with detail at the route layer; clients
    /// see only a generic error code.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<CredentialError> for AuthError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::InvalidEmail => Self::InvalidEmail,
            CredentialError::DuplicateAccount => Self::EmailInUse,
            CredentialError::Hash(detail) => Self::Storage(detail),
            CredentialError::Db(e) => Self::Storage(e.to_string()),
        }
    }
}

impl From<SessionError> for AuthError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Db(e) => Self::Storage(e.to_string()),
        }
    }
}

impl From<ThrottleError> for AuthError {
    fn from(_: ThrottleError) -> Self {
        Self::TooManyAttempts
    }
}

// =============================================================================
// PASSWORD POLICY
// =============================================================================

/// Minimum password requirements checked at registration. The length floor
/// is a tunable, not a contract.
#[derive(Debug, Clone, Copy)]
pub struct PasswordPolicy {
    pub min_length: usize,
}

impl PasswordPolicy {
    /// Load from `PASSWORD_MIN_LENGTH`, defaulting to 8.
    #[must_use]
    pub fn from_env() -> Self {
        let min_length = std::env::var("PASSWORD_MIN_LENGTH")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_PASSWORD_MIN_LENGTH);
        Self { min_length }
    }

    /// Require the minimum length plus at least one ASCII letter and one
    /// digit.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` when any requirement is missing.
    pub fn validate(&self, password: &str) -> Result<(), AuthError> {
        let long_enough = password.chars().count() >= self.min_length;
        let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
        let has_digit = password.chars().any(|c| c.is_ascii_digit());
        if long_enough && has_letter && has_digit {
            Ok(())
        } else {
            Err(AuthError::WeakPassword)
        }
    }
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self { min_length: DEFAULT_PASSWORD_MIN_LENGTH }
    }
}

// =============================================================================
// AUTH SERVICE
// =============================================================================

/// Orchestrates the credential store, session issuer, and login throttle.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    sessions: SessionIssuer,
    policy: PasswordPolicy,
    throttle: LoginThrottle,
}

impl AuthService {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, sessions: SessionIssuer, policy: PasswordPolicy) -> Self {
        Self { store, sessions, policy, throttle: LoginThrottle::new() }
    }

    /// Register a new account and return its normalized email. The password
    /// hash never leaves the store.
    ///
    /// # Errors
    ///
    /// `InvalidEmail` before `WeakPassword` when both apply; `EmailInUse` on
    /// a duplicate normalized email.
    pub async fn register(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let normalized = normalize_email(email).ok_or(AuthError::InvalidEmail)?;
        self.policy.validate(password)?;
        let account = self.store.create(&normalized, password).await?;
        tracing::info!(account_id = %account.id, "account created");
        Ok(account.email)
    }

    /// Log in and issue a session. Malformed email, unknown account, and
    /// wrong password are all `InvalidCredentials`.
    ///
    /// # Errors
    ///
    /// `TooManyAttempts` once the failure window for this email is full.
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedSession, AuthError> {
        let Some(normalized) = normalize_email(email) else {
            return Err(AuthError::InvalidCredentials);
        };
        self.throttle.check(&normalized)?;
        if !self.store.verify(&normalized, password).await? {
            self.throttle.record_failure(&normalized);
            return Err(AuthError::InvalidCredentials);
        }
        self.throttle.clear(&normalized);
        Ok(self.sessions.issue(&normalized).await?)
    }

    /// Log out. Idempotent: unknown or already-revoked tokens are fine.
    ///
    /// # Errors
    ///
    /// Returns an error only on storage failure.
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        Ok(self.sessions.revoke(token).await?)
    }

    /// Resolve a session token to its account email, or `None`.
    ///
    /// # Errors
    ///
    /// Returns an error only on storage failure.
    pub async fn validate(&self, token: &str) -> Result<Option<String>, AuthError> {
        Ok(self.sessions.validate(token).await?)
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
