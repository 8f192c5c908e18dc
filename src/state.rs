//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. The
//! auth service carries everything handlers need (credential store, session
//! issuer, policy, throttle), so the state itself stays thin.

use crate::services::auth::AuthService;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum — the auth service is internally Arc-backed.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
}

impl AppState {
    #[must_use]
    pub fn new(auth: AuthService) -> Self {
        Self { auth }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
