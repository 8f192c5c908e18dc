//! Auth routes — registration, login, logout, session introspection.

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use serde::{Deserialize, Serialize};

use crate::services::auth::AuthError;
use crate::state::AppState;

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// Stable machine-readable code for each externally visible error.
pub(crate) fn error_code(err: &AuthError) -> &'static str {
    match err {
        AuthError::InvalidEmail => "invalid_email",
        AuthError::WeakPassword => "weak_password",
        AuthError::EmailInUse => "email_in_use",
        AuthError::InvalidCredentials => "invalid_credentials",
        AuthError::TooManyAttempts => "too_many_attempts",
        AuthError::Storage(_) => "internal_error",
    }
}

pub(crate) fn error_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidEmail | AuthError::WeakPassword => StatusCode::BAD_REQUEST,
        AuthError::EmailInUse => StatusCode::CONFLICT,
        AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AuthError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
        AuthError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Wrapper so handlers can `?` auth failures straight into a response.
#[derive(Debug)]
pub struct ApiError(AuthError);

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let AuthError::Storage(detail) = &self.0 {
            tracing::error!(error = %detail, "storage failure");
        }
        let status = error_status(&self.0);
        let body = Json(serde_json::json!({ "error": error_code(&self.0) }));
        (status, body).into_response()
    }
}

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated account extracted from the bearer token.
/// Use as a handler parameter to require a live session.
pub struct AuthUser {
    pub email: String,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            <TypedHeader<Authorization<Bearer>> as axum::extract::FromRequestParts<S>>::from_request_parts(
                parts, state,
            )
            .await
            .map_err(|_| StatusCode::UNAUTHORIZED)?;
        let app_state = AppState::from_ref(state);
        let email = app_state
            .auth
            .validate(bearer.token())
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(Self { email })
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    /// Unix timestamp (seconds).
    pub expires_at: i64,
}

/// `POST /api/auth/register` — create an account.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let email = state.auth.register(&req.email, &req.password).await?;
    Ok((StatusCode::CREATED, Json(RegisterResponse { email })))
}

/// `POST /api/auth/login` — exchange credentials for a session token.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let session = state.auth.login(&req.email, &req.password).await?;
    Ok(Json(LoginResponse {
        token: session.token,
        expires_at: session.expires_at.unix_timestamp(),
    }))
}

/// `POST /api/auth/logout` — revoke the presented token. Succeeds whether or
/// not the token was live.
pub async fn logout(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
) -> Result<StatusCode, ApiError> {
    state.auth.logout(bearer.token()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/auth/me` — return the account email for a live session.
pub async fn me(auth: AuthUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "email": auth.email }))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
