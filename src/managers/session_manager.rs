//! Session recovery state machine.
//!
//! Resolves "is there a valid authenticated session" at process start and on
//! demand. Recovery is single-flight (concurrent callers share one network
//! round), bounded (fixed-delay retries plus one fallback probe, under a
//! hard ceiling), and always terminates in `Ready` — a resolved user or an
//! explicit absence, never an indeterminate state.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::watch;

use crate::backend::auth::AuthBackend;
use crate::backend::local::LocalStore;
use crate::services::retry::{retry_with_backoff, RetryPolicy};
use crate::types::errors::{AuthError, SessionError};
use crate::types::session::{AuthUser, SessionState};

/// Local-storage key holding the last explicit-logout timestamp (epoch ms).
pub const LOGOUT_MARKER_KEY: &str = "session.logged_out_at";

/// Tunables for session recovery.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Total attempts of the primary strategy.
    pub max_attempts: u32,
    /// Fixed delay between primary attempts.
    pub retry_delay: Duration,
    /// Hard ceiling on one recovery run; hitting it resolves to "no user".
    pub init_timeout: Duration,
    /// Window after an explicit logout during which recovery short-circuits
    /// to "no user" without touching the network.
    pub logout_cooldown: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            retry_delay: Duration::from_millis(500),
            init_timeout: Duration::from_secs(5),
            logout_cooldown: Duration::from_secs(5),
        }
    }
}

/// The session recovery state machine.
///
/// Constructed once at the composition root and injected into consumers;
/// all session-state mutation goes through these entry points.
pub struct SessionManager {
    auth: Arc<dyn AuthBackend>,
    store: Arc<dyn LocalStore>,
    config: SessionConfig,
    state_tx: watch::Sender<SessionState>,
    recovery_lock: tokio::sync::Mutex<()>,
    /// Bumped once per completed resolution; lets a caller that waited out
    /// an in-flight recovery reuse its outcome instead of starting another.
    resolve_generation: AtomicU64,
    last_error: Mutex<Option<SessionError>>,
}

impl SessionManager {
    pub fn new(auth: Arc<dyn AuthBackend>, store: Arc<dyn LocalStore>, config: SessionConfig) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Unknown);
        Self {
            auth,
            store,
            config,
            state_tx,
            recovery_lock: tokio::sync::Mutex::new(()),
            resolve_generation: AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }

    fn now_millis() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64
    }

    /// Current state snapshot.
    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    /// A receiver observing every state transition.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// The non-fatal error surfaced by the most recent recovery run, if any.
    pub fn last_recovery_error(&self) -> Option<SessionError> {
        match self.last_error.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_error(&self, error: Option<SessionError>) {
        let mut guard = match self.last_error.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = error;
    }

    /// True while the explicit-logout cooldown window is open.
    pub fn logout_cooldown_active(&self) -> bool {
        let marked_at = match self.store.get(LOGOUT_MARKER_KEY) {
            Ok(Some(raw)) => raw.parse::<i64>().ok(),
            _ => None,
        };
        match marked_at {
            Some(at) => {
                Self::now_millis().saturating_sub(at) < self.config.logout_cooldown.as_millis() as i64
            }
            None => false,
        }
    }

    /// Records an explicit logout. Called before the network sign-out
    /// completes, so a concurrent recovery attempt sees the marker and
    /// cannot undo the logout.
    pub fn mark_logged_out(&self) {
        // Best-effort: a marker write failure must not block logging out.
        let _ = self
            .store
            .set(LOGOUT_MARKER_KEY, &Self::now_millis().to_string());
        self.state_tx.send_replace(SessionState::Ready(None));
    }

    pub fn clear_logout_marker(&self) {
        let _ = self.store.remove(LOGOUT_MARKER_KEY);
    }

    /// Adopts a session obtained through an explicit sign-in/sign-up.
    pub fn adopt_user(&self, user: AuthUser) {
        self.clear_logout_marker();
        self.set_error(None);
        self.state_tx.send_replace(SessionState::Ready(Some(user)));
        self.resolve_generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Clears the resolved user without opening a logout cooldown window —
    /// used when expiry is detected rather than chosen.
    pub fn clear_user_state(&self) {
        self.state_tx.send_replace(SessionState::Ready(None));
    }

    /// Resolves the session. Always terminates in `Ready`.
    ///
    /// Concurrent calls coalesce: a call arriving while a recovery is in
    /// flight awaits it and returns the same outcome instead of starting a
    /// duplicate network round. A sequential call probes afresh.
    pub async fn recover_session(&self) -> SessionState {
        if self.logout_cooldown_active() {
            let state = SessionState::Ready(None);
            self.state_tx.send_replace(state.clone());
            return state;
        }

        let arrived_generation = self.resolve_generation.load(Ordering::Acquire);
        let _guard = self.recovery_lock.lock().await;
        if self.resolve_generation.load(Ordering::Acquire) != arrived_generation {
            // A concurrent call resolved while we waited for the lock.
            return self.state();
        }

        self.set_error(None);
        let user = match tokio::time::timeout(self.config.init_timeout, self.run_recovery()).await {
            Ok(user) => user,
            Err(_) => {
                self.set_error(Some(SessionError::RecoveryTimeout));
                None
            }
        };

        // An explicit logout may have landed while we were probing; it wins.
        let user = if self.logout_cooldown_active() { None } else { user };

        let state = SessionState::Ready(user);
        self.state_tx.send_replace(state.clone());
        self.resolve_generation.fetch_add(1, Ordering::AcqRel);
        state
    }

    async fn run_recovery(&self) -> Option<AuthUser> {
        let retries = self.config.max_attempts.saturating_sub(1);
        let policy = RetryPolicy::fixed(retries, self.config.retry_delay);
        let attempt = AtomicU32::new(0);
        let primary = retry_with_backoff(&policy, || {
            let n = attempt.fetch_add(1, Ordering::Relaxed);
            self.state_tx
                .send_replace(SessionState::Recovering { attempt: n });
            self.auth.get_session()
        })
        .await;

        match primary {
            Ok(Some(session)) => return Some(session.user),
            // A clean "no stored credentials" won't change on retry; go
            // straight to the fallback.
            Ok(None) => {}
            Err(err) => self.set_error(Some(SessionError::Backend(err.to_string()))),
        }

        // Fallback strategy: a direct user probe, tried once.
        match self.auth.get_user().await {
            Ok(user) => user,
            Err(err) => {
                self.set_error(Some(SessionError::Backend(err.to_string())));
                None
            }
        }
    }

    /// Lightweight, idempotent probe for silent expiry — usable on a timer.
    /// Returns `false` when the backend no longer recognizes the
    /// credentials; the caller clears user state and redirects.
    pub async fn validate_session(&self) -> Result<bool, SessionError> {
        match self.auth.get_user().await {
            Ok(Some(_)) => Ok(true),
            Ok(None) => Ok(false),
            Err(AuthError::Unauthorized) => Ok(false),
            Err(err) => Err(SessionError::Backend(err.to_string())),
        }
    }
}
