//! Authenticated execution context for task work.
//!
//! Tasks run outside any request context, so there is no ambient session to
//! inherit. Instead of a process-wide "current user" each task receives an
//! explicit [`ServiceContext`] holding the scheduler's service-account
//! credentials and a handle to the authentication service, and opens its own
//! session before doing privileged work. Sessions are scoped to the task that
//! opened them and are never shared.

use crate::config::SchedulerCredentials;
use crate::errors::AuthError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error};

/// An authenticated session established for one task.
#[derive(Clone, Debug)]
pub struct Session {
    pub username: String,
    pub opened_at: DateTime<Utc>,
}

/// Authentication service consumed by the scheduler core.
///
/// The real implementation lives in the surrounding records system; the core
/// only needs credential verification.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str) -> Result<Session, AuthError>;
}

/// Authentication against a single statically configured service account.
///
/// Suitable for deployments where the scheduler account is provisioned at
/// install time, and for tests.
pub struct StaticAuthService {
    username: String,
    password: String,
}

impl StaticAuthService {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
impl AuthService for StaticAuthService {
    async fn authenticate(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        if username == self.username && password == self.password {
            Ok(Session {
                username: username.to_string(),
                opened_at: Utc::now(),
            })
        } else {
            Err(AuthError::AuthenticationFailed {
                username: username.to_string(),
                details: "invalid credentials".to_string(),
            })
        }
    }
}

/// Execution context handed to every task: the scheduler credentials plus the
/// authentication service they are verified against.
pub struct ServiceContext {
    auth: Arc<dyn AuthService>,
    credentials: SchedulerCredentials,
}

impl ServiceContext {
    pub fn new(auth: Arc<dyn AuthService>, credentials: SchedulerCredentials) -> Self {
        Self { auth, credentials }
    }

    /// Open a session with the stored scheduler credentials.
    ///
    /// On failure the error is logged and `None` is returned; the task keeps
    /// running unauthenticated and any privileged call downstream is expected
    /// to fail loudly on its own.
    pub async fn open_session(&self) -> Option<Session> {
        match self
            .auth
            .authenticate(&self.credentials.username, &self.credentials.password)
            .await
        {
            Ok(session) => {
                debug!(username = %session.username, "Opened scheduler session");
                Some(session)
            }
            Err(e) => {
                error!(
                    username = %self.credentials.username,
                    error = %e,
                    "Scheduler authentication failed, task will run unauthenticated"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_auth_accepts_matching_credentials() {
        let auth = StaticAuthService::new("admin", "test");
        let session = auth.authenticate("admin", "test").await.unwrap();
        assert_eq!(session.username, "admin");
    }

    #[tokio::test]
    async fn test_static_auth_rejects_bad_password() {
        let auth = StaticAuthService::new("admin", "test");
        let err = auth.authenticate("admin", "wrong").await.unwrap_err();
        assert!(err.to_string().contains("error-clinsched-auth-1"));
    }

    #[tokio::test]
    async fn test_open_session_returns_none_on_failure() {
        let auth = Arc::new(StaticAuthService::new("admin", "test"));
        let bad_creds =
            SchedulerCredentials::new("admin".to_string(), "wrong".to_string()).unwrap();
        let ctx = ServiceContext::new(auth, bad_creds);
        assert!(ctx.open_session().await.is_none());
    }

    #[tokio::test]
    async fn test_open_session_succeeds_with_configured_credentials() {
        let auth = Arc::new(StaticAuthService::new("admin", "test"));
        let ctx = ServiceContext::new(auth, SchedulerCredentials::default());
        let session = ctx.open_session().await.expect("session should open");
        assert_eq!(session.username, "admin");
    }
}
