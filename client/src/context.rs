//! Process-wide mutable state: the authenticated session and the
//! single-flight guards.
//!
//! Single-writer rule: only the auth flow writes the session (set on
//! verify, cleared on logout or detected expiry). Everything else reads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::error::{ClientError, Result};

/// Session established by a successful challenge/response sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub wallet_address: String,
    pub chain: String,
    pub token: String,
    pub user_uuid: String,
}

/// Fail-fast mutual exclusion for wallet popups.
///
/// The wallet extension refuses overlapping requests with a confusing
/// native error, so a second caller is rejected up front instead of queued.
#[derive(Debug, Default)]
pub struct FlightGuard {
    busy: AtomicBool,
}

impl FlightGuard {
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    /// Claims the guard, or fails with [`ClientError::RequestAlreadyPending`].
    pub fn acquire(&self) -> Result<FlightPermit<'_>> {
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(ClientError::RequestAlreadyPending);
        }
        Ok(FlightPermit { guard: self })
    }
}

/// Releases the owning [`FlightGuard`] on drop, including on early error
/// returns and panics.
pub struct FlightPermit<'a> {
    guard: &'a FlightGuard,
}

impl Drop for FlightPermit<'_> {
    fn drop(&mut self) {
        self.guard.busy.store(false, Ordering::Release);
    }
}

/// Owned application context injected into every component.
#[derive(Debug, Default)]
pub struct AppContext {
    session: Mutex<Option<AuthSession>>,
    /// Serializes connect/sign calls against the wallet extension.
    pub wallet_flight: FlightGuard,
    /// Serializes whole sign-in flows, one layer above `wallet_flight`.
    pub login_flight: FlightGuard,
}

impl AppContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<AuthSession> {
        self.lock_session().clone()
    }

    pub fn set_session(&self, session: AuthSession) {
        *self.lock_session() = Some(session);
    }

    pub fn clear_session(&self) {
        *self.lock_session() = None;
    }

    /// Forced-logout side effect: an expired-session error from any backend
    /// call resets the session, independent of which call produced it.
    pub fn guard_session<T>(&self, result: Result<T>) -> Result<T> {
        if matches!(result, Err(ClientError::SessionExpired)) {
            tracing::warn!("session expired, forcing logout");
            self.clear_session();
        }
        result
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, Option<AuthSession>> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flight_guard_is_exclusive() {
        let guard = FlightGuard::new();
        let permit = guard.acquire().unwrap();
        assert!(matches!(
            guard.acquire(),
            Err(ClientError::RequestAlreadyPending)
        ));
        drop(permit);
        assert!(guard.acquire().is_ok());
    }

    #[test]
    fn expiry_clears_session() {
        let ctx = AppContext::new();
        ctx.set_session(AuthSession {
            wallet_address: "w".into(),
            chain: "devnet".into(),
            token: "t".into(),
            user_uuid: "u".into(),
        });
        let _ = ctx.guard_session::<()>(Err(ClientError::SessionExpired));
        assert!(ctx.session().is_none());

        // Other errors leave the session alone.
        ctx.set_session(AuthSession {
            wallet_address: "w".into(),
            chain: "devnet".into(),
            token: "t".into(),
            user_uuid: "u".into(),
        });
        let _ = ctx.guard_session::<()>(Err(ClientError::ConnectionRejected));
        assert!(ctx.session().is_some());
    }
}
