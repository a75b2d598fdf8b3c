//! Test helper utilities for clinsched tests
//!
//! Common fixtures shared by unit tests across modules. Task fixtures that a
//! single test module needs (counting, flaky, slow-init tasks) live next to
//! the tests that use them.

use crate::config::SchedulerCredentials;
use crate::context::{AuthService, ServiceContext, Session};
use crate::errors::AuthError;
use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

// Test environment mutex to prevent concurrent environment variable modification
pub static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Auth service that counts attempts and can be switched to reject them.
pub struct RecordingAuthService {
    pub attempts: AtomicU64,
    pub reject: bool,
}

impl RecordingAuthService {
    pub fn accepting() -> Self {
        Self {
            attempts: AtomicU64::new(0),
            reject: false,
        }
    }

    pub fn rejecting() -> Self {
        Self {
            attempts: AtomicU64::new(0),
            reject: true,
        }
    }
}

#[async_trait]
impl AuthService for RecordingAuthService {
    async fn authenticate(&self, username: &str, _password: &str) -> Result<Session, AuthError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.reject {
            Err(AuthError::AuthenticationFailed {
                username: username.to_string(),
                details: "rejected by test fixture".to_string(),
            })
        } else {
            Ok(Session {
                username: username.to_string(),
                opened_at: Utc::now(),
            })
        }
    }
}

/// Service context backed by a [`RecordingAuthService`] and the default
/// scheduler credentials.
pub fn test_context(auth: Arc<RecordingAuthService>) -> Arc<ServiceContext> {
    Arc::new(ServiceContext::new(auth, SchedulerCredentials::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskState;

    #[tokio::test]
    async fn test_recording_auth_counts_attempts() {
        let auth = Arc::new(RecordingAuthService::accepting());
        let state = TaskState::with_context(test_context(Arc::clone(&auth)));

        state.authenticate().await;
        state.authenticate().await;

        // A held session short-circuits the second attempt
        assert_eq!(auth.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejecting_auth_retried_every_run() {
        let auth = Arc::new(RecordingAuthService::rejecting());
        let state = TaskState::with_context(test_context(Arc::clone(&auth)));

        state.authenticate().await;
        state.authenticate().await;

        // No session was established, so every run retries
        assert_eq!(auth.attempts.load(Ordering::SeqCst), 2);
        assert!(!state.is_authenticated());
    }
}
