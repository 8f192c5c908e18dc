//! In-memory throttling of failed login attempts.
//!
//! DESIGN
//! ======
//! Sliding-window counters backed by `HashMap<email, VecDeque<Instant>>`.
//! Only failures count against the window; a successful login clears it.
//! This bounds online password guessing per account without locking anyone
//! out permanently.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const DEFAULT_MAX_FAILURES: usize = 10;
const DEFAULT_FAILURE_WINDOW_SECS: u64 = 300;

#[derive(Clone, Copy)]
struct ThrottleConfig {
    max_failures: usize,
    failure_window: Duration,
}

impl ThrottleConfig {
    fn from_env() -> Self {
        let window_secs = env_parse("LOGIN_FAILURE_WINDOW_SECS", DEFAULT_FAILURE_WINDOW_SECS);
        Self {
            max_failures: env_parse("LOGIN_MAX_FAILURES", DEFAULT_MAX_FAILURES),
            failure_window: Duration::from_secs(window_secs),
        }
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ThrottleError {
    #[error("too many failed attempts (max {limit} per {window_secs}s)")]
    LimitExceeded { limit: usize, window_secs: u64 },
}

// =============================================================================
// LOGIN THROTTLE
// =============================================================================

#[derive(Clone)]
pub struct LoginThrottle {
    inner: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    config: ThrottleConfig,
}

impl LoginThrottle {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            config: ThrottleConfig::from_env(),
        }
    }

    /// Reject when the failure window for this email is already full.
    ///
    /// # Errors
    ///
    /// Returns `ThrottleError::LimitExceeded` once the window is full.
    pub fn check(&self, email: &str) -> Result<(), ThrottleError> {
        self.check_at(email, Instant::now())
    }

    /// Internal: check with explicit timestamp (for testing).
    fn check_at(&self, email: &str, now: Instant) -> Result<(), ThrottleError> {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let cfg = self.config;
        let Some(deque) = inner.get_mut(email) else {
            return Ok(());
        };
        prune_window(deque, now, cfg.failure_window);
        if deque.len() >= cfg.max_failures {
            return Err(ThrottleError::LimitExceeded {
                limit: cfg.max_failures,
                window_secs: cfg.failure_window.as_secs(),
            });
        }
        Ok(())
    }

    /// Record a failed attempt.
    pub fn record_failure(&self, email: &str) {
        self.record_failure_at(email, Instant::now());
    }

    fn record_failure_at(&self, email: &str, now: Instant) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let window = self.config.failure_window;
        let deque = inner.entry(email.to_owned()).or_default();
        prune_window(deque, now, window);
        deque.push_back(now);
    }

    /// Clear the window after a successful login.
    pub fn clear(&self, email: &str) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.remove(email);
    }
}

impl Default for LoginThrottle {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = deque.front() {
        if now.duration_since(front) > window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
