//! Re-authentication guard.
//!
//! # Responsibility
//! - Track whether the session currently holds valid remote credentials.
//! - Run one bounded re-authentication + retry when a remote call reports
//!   expired credentials.
//!
//! # Invariants
//! - A guarded operation is attempted at most twice.
//! - A second credential failure leaves the guard `Unauthenticated` and is
//!   returned to the caller unchanged.

use super::operation::Operation;
use super::remote::{RemoteError, RemoteResult};
use async_trait::async_trait;
use log::{error, info, warn};
use std::sync::Arc;

/// Re-establishes remote credentials (interactive or token refresh).
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn reauthenticate(&self) -> RemoteResult<()>;
}

/// Credential state observed by the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Authenticated,
    Unauthenticated,
}

/// Two-state credential tracker shared by every guarded operation.
pub struct ReauthGuard {
    authenticator: Arc<dyn Authenticator>,
    state: AuthState,
}

impl ReauthGuard {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            authenticator,
            state: AuthState::Authenticated,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Runs the blocking re-authentication flow after a credential failure.
    pub async fn reauthenticate(&mut self, operation: Operation) -> RemoteResult<()> {
        self.state = AuthState::Unauthenticated;
        warn!(
            "event=reauth module=sync status=start operation={}",
            operation.key()
        );
        match self.authenticator.reauthenticate().await {
            Ok(()) => {
                self.state = AuthState::Authenticated;
                info!(
                    "event=reauth module=sync status=ok operation={}",
                    operation.key()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=reauth module=sync status=error operation={} error_code={}",
                    operation.key(),
                    err.code()
                );
                Err(err)
            }
        }
    }

    /// Records a terminal credential failure after the single retry.
    pub fn mark_unauthenticated(&mut self, operation: Operation) {
        self.state = AuthState::Unauthenticated;
        error!(
            "event=reauth module=sync status=error operation={} error_code=retry_exhausted",
            operation.key()
        );
    }

    /// Marks the session as signed out.
    pub fn sign_out(&mut self) {
        self.state = AuthState::Unauthenticated;
    }

    /// Marks the session as signed in.
    pub fn sign_in(&mut self) {
        self.state = AuthState::Authenticated;
    }
}

/// Awaits `$attempt`; on a credential failure re-authenticates through
/// `$guard` and awaits `$attempt` exactly once more.
///
/// `$attempt` must be an expression producing a future of
/// `Result<T, RemoteError>`; it is evaluated again for the retry.
macro_rules! with_reauth {
    ($guard:expr, $operation:expr, $attempt:expr) => {{
        let first: $crate::sync::remote::RemoteResult<_> = $attempt.await;
        match first {
            Err(err) if err.is_credential_expired() => {
                match $guard.reauthenticate($operation).await {
                    Ok(()) => {
                        let retried: $crate::sync::remote::RemoteResult<_> = $attempt.await;
                        if matches!(&retried, Err(err) if err.is_credential_expired()) {
                            $guard.mark_unauthenticated($operation);
                        }
                        retried
                    }
                    Err(auth_err) => Err(auth_err),
                }
            }
            other => other,
        }
    }};
}

pub(crate) use with_reauth;

/// Authenticator that always fails; used when no sign-in flow is wired.
pub struct NoReauthentication;

#[async_trait]
impl Authenticator for NoReauthentication {
    async fn reauthenticate(&self) -> RemoteResult<()> {
        Err(RemoteError::CredentialExpired(
            "no re-authentication flow configured".to_string(),
        ))
    }
}
