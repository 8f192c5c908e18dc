use std::sync::Arc;

use time::Duration;

use super::*;
use crate::services::credential::MemoryCredentialStore;
use crate::services::session::{MemorySessionStore, SessionIssuer};

fn test_service() -> AuthService {
    let issuer = SessionIssuer::new(Arc::new(MemorySessionStore::new()), Duration::hours(24));
    AuthService::new(Arc::new(MemoryCredentialStore::new()), issuer, PasswordPolicy::default())
}

// =============================================================================
// PasswordPolicy
// =============================================================================

#[test]
fn policy_rejects_short_password() {
    assert!(matches!(PasswordPolicy::default().validate("short1"), Err(AuthError::WeakPassword)));
}

#[test]
fn policy_rejects_password_without_digit() {
    assert!(matches!(
        PasswordPolicy::default().validate("alllettersnodigit"),
        Err(AuthError::WeakPassword)
    ));
}

#[test]
fn policy_rejects_password_without_letter() {
    assert!(matches!(PasswordPolicy::default().validate("12345678"), Err(AuthError::WeakPassword)));
}

#[test]
fn policy_accepts_letter_and_digit_at_length() {
    PasswordPolicy::default().validate("longenough1").unwrap();
    PasswordPolicy::default().validate("abcd1234").unwrap();
}

#[test]
fn policy_min_length_is_tunable() {
    let strict = PasswordPolicy { min_length: 12 };
    assert!(matches!(strict.validate("abcd1234"), Err(AuthError::WeakPassword)));
    strict.validate("abcdefgh1234").unwrap();
}

// =============================================================================
// register
// =============================================================================

#[tokio::test]
async fn register_returns_normalized_email() {
    let auth = test_service();
    let email = auth.register("User@Example.com", "abc12345").await.unwrap();
    assert_eq!(email, "user@example.com");
}

#[tokio::test]
async fn register_rejects_invalid_email() {
    let auth = test_service();
    let err = auth.register("not-an-email", "abc12345").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidEmail));
}

#[tokio::test]
async fn register_rejects_weak_password() {
    let auth = test_service();
    let err = auth.register("user@example.com", "short1").await.unwrap_err();
    assert!(matches!(err, AuthError::WeakPassword));
}

#[tokio::test]
async fn register_invalid_email_wins_over_weak_password() {
    let auth = test_service();
    let err = auth.register("not-an-email", "short1").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidEmail));
}

#[tokio::test]
async fn register_duplicate_email_is_in_use() {
    let auth = test_service();
    auth.register("User@Example.com", "abc12345").await.unwrap();
    let err = auth.register("user@example.com", "xyz98765").await.unwrap_err();
    assert!(matches!(err, AuthError::EmailInUse));
}

// =============================================================================
// login
// =============================================================================

#[tokio::test]
async fn register_then_login_yields_valid_session() {
    let auth = test_service();
    auth.register("user@example.com", "abc12345").await.unwrap();
    let session = auth.login("user@example.com", "abc12345").await.unwrap();
    assert_eq!(session.token.len(), 64);
    let email = auth.validate(&session.token).await.unwrap();
    assert_eq!(email.as_deref(), Some("user@example.com"));
}

#[tokio::test]
async fn login_wrong_password_and_unknown_email_are_indistinguishable() {
    let auth = test_service();
    auth.register("user@example.com", "abc12345").await.unwrap();
    let wrong_password = auth.login("user@example.com", "wrong1234").await.unwrap_err();
    let unknown_email = auth.login("ghost@example.com", "abc12345").await.unwrap_err();
    assert!(matches!(wrong_password, AuthError::InvalidCredentials));
    assert!(matches!(unknown_email, AuthError::InvalidCredentials));
}

#[tokio::test]
async fn login_malformed_email_is_invalid_credentials() {
    let auth = test_service();
    let err = auth.login("not-an-email", "abc12345").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[tokio::test]
async fn login_is_case_insensitive_on_email() {
    let auth = test_service();
    auth.register("User@Example.com", "abc12345").await.unwrap();
    auth.login("USER@EXAMPLE.COM", "abc12345").await.unwrap();
}

// =============================================================================
// logout / validate
// =============================================================================

#[tokio::test]
async fn logout_then_validate_is_absent() {
    let auth = test_service();
    auth.register("user@example.com", "abc12345").await.unwrap();
    let session = auth.login("user@example.com", "abc12345").await.unwrap();
    auth.logout(&session.token).await.unwrap();
    assert_eq!(auth.validate(&session.token).await.unwrap(), None);
}

#[tokio::test]
async fn logout_is_idempotent() {
    let auth = test_service();
    auth.register("user@example.com", "abc12345").await.unwrap();
    let session = auth.login("user@example.com", "abc12345").await.unwrap();
    auth.logout(&session.token).await.unwrap();
    auth.logout(&session.token).await.unwrap();
    auth.logout("never-was-a-token").await.unwrap();
}

// =============================================================================
// throttle
// =============================================================================

#[tokio::test]
async fn repeated_failures_trip_the_throttle() {
    let auth = test_service();
    auth.register("user@example.com", "abc12345").await.unwrap();

    for _ in 0..10 {
        let err = auth.login("user@example.com", "wrong1234").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    // Even the correct password is rejected until the window slides.
    let err = auth.login("user@example.com", "abc12345").await.unwrap_err();
    assert!(matches!(err, AuthError::TooManyAttempts));
}

// =============================================================================
// end-to-end scenario
// =============================================================================

#[tokio::test]
async fn register_login_logout_scenario() {
    let auth = test_service();

    let email = auth.register("User@Example.com", "abc12345").await.unwrap();
    assert_eq!(email, "user@example.com");

    let err = auth.register("user@example.com", "xyz98765").await.unwrap_err();
    assert!(matches!(err, AuthError::EmailInUse));

    let session = auth.login("user@example.com", "abc12345").await.unwrap();

    let err = auth.login("user@example.com", "wrong1234").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));

    auth.logout(&session.token).await.unwrap();
    assert_eq!(auth.validate(&session.token).await.unwrap(), None);
}
