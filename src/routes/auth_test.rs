use super::*;

use crate::state::test_helpers::test_app_state;

// =============================================================================
// error mapping
// =============================================================================

#[test]
fn error_codes_are_stable() {
    assert_eq!(error_code(&AuthError::InvalidEmail), "invalid_email");
    assert_eq!(error_code(&AuthError::WeakPassword), "weak_password");
    assert_eq!(error_code(&AuthError::EmailInUse), "email_in_use");
    assert_eq!(error_code(&AuthError::InvalidCredentials), "invalid_credentials");
    assert_eq!(error_code(&AuthError::TooManyAttempts), "too_many_attempts");
    assert_eq!(error_code(&AuthError::Storage("detail".into())), "internal_error");
}

#[test]
fn error_statuses_match_taxonomy() {
    assert_eq!(error_status(&AuthError::InvalidEmail), StatusCode::BAD_REQUEST);
    assert_eq!(error_status(&AuthError::WeakPassword), StatusCode::BAD_REQUEST);
    assert_eq!(error_status(&AuthError::EmailInUse), StatusCode::CONFLICT);
    assert_eq!(error_status(&AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED);
    assert_eq!(error_status(&AuthError::TooManyAttempts), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(error_status(&AuthError::Storage("detail".into())), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn storage_error_body_never_leaks_detail() {
    let response = ApiError(AuthError::Storage("password_hash column missing".into())).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

// =============================================================================
// handlers (memory-backed state, no HTTP layer)
// =============================================================================

fn credentials(email: &str, password: &str) -> Json<CredentialsRequest> {
    Json(CredentialsRequest { email: email.to_owned(), password: password.to_owned() })
}

#[tokio::test]
async fn register_handler_returns_created_with_normalized_email() {
    let state = test_app_state();
    let (status, Json(body)) = register(State(state), credentials("User@Example.com", "abc12345"))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body.email, "user@example.com");
}

#[tokio::test]
async fn register_handler_maps_duplicate_to_conflict() {
    let state = test_app_state();
    register(State(state.clone()), credentials("user@example.com", "abc12345"))
        .await
        .unwrap();
    let response = register(State(state), credentials("user@example.com", "xyz98765"))
        .await
        .unwrap_err()
        .into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_handler_returns_token_and_expiry() {
    let state = test_app_state();
    register(State(state.clone()), credentials("user@example.com", "abc12345"))
        .await
        .unwrap();
    let Json(body) = login(State(state), credentials("user@example.com", "abc12345"))
        .await
        .unwrap();
    assert_eq!(body.token.len(), 64);
    assert!(body.expires_at > time::OffsetDateTime::now_utc().unix_timestamp());
}

#[tokio::test]
async fn login_handler_rejects_bad_password_as_unauthorized() {
    let state = test_app_state();
    register(State(state.clone()), credentials("user@example.com", "abc12345"))
        .await
        .unwrap();
    let response = login(State(state), credentials("user@example.com", "wrong1234"))
        .await
        .unwrap_err()
        .into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_handler_is_idempotent() {
    let state = test_app_state();
    register(State(state.clone()), credentials("user@example.com", "abc12345"))
        .await
        .unwrap();
    let Json(body) = login(State(state.clone()), credentials("user@example.com", "abc12345"))
        .await
        .unwrap();

    let header = TypedHeader(Authorization::bearer(&body.token).unwrap());
    let status = logout(State(state.clone()), header).await.unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let header = TypedHeader(Authorization::bearer(&body.token).unwrap());
    let status = logout(State(state), header).await.unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn me_handler_echoes_session_email() {
    let auth = AuthUser { email: "user@example.com".into() };
    let Json(body) = me(auth).await;
    assert_eq!(body["email"], "user@example.com");
}
