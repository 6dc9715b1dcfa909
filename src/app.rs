//! Composition root for the sync core.
//!
//! [`SyncCore`] constructs every component with injected boundaries and owns
//! the wiring between them: session recovery gates subscriptions, session
//! transitions drive the mode reconciler, and authoritative events fan out
//! over the broadcast channel. Nothing in the crate is a module-level
//! singleton — consumers hold whatever pieces they are handed from here.

use std::sync::{Arc, Mutex};

use crate::backend::auth::AuthBackend;
use crate::backend::channel::InterContextChannel;
use crate::backend::feed::ChangeFeedTransport;
use crate::backend::local::LocalStore;
use crate::backend::rest::{RemoteStore, FOLDERS_TABLE, LINKS_TABLE};
use crate::managers::mirror::Mirror;
use crate::managers::mode_reconciler::{ModeReconciler, ModeReconcilerTrait, StorageMode};
use crate::managers::mutation_gate::MutationGate;
use crate::managers::session_manager::{SessionConfig, SessionManager};
use crate::managers::subscription_manager::{EventCallback, SubscriptionManager};
use crate::services::broadcast_sync::{BroadcastHandler, BroadcastSync};
use crate::services::guest_store::GuestStore;
use crate::services::retry::RetryPolicy;
use crate::types::errors::{AuthError, RemoteError, SubscriptionError};
use crate::types::events::BroadcastMessage;
use crate::types::session::{Credentials, SessionState};
use crate::types::subscription::{DebounceSpec, SubscriptionConfig};

/// The injected external boundaries.
pub struct Backends {
    pub auth: Arc<dyn AuthBackend>,
    pub transport: Arc<dyn ChangeFeedTransport>,
    pub local: Arc<dyn LocalStore>,
    pub remote: Arc<dyn RemoteStore>,
    /// Environment-dependent; `None` degrades to single-context behavior.
    pub channel: Option<Arc<dyn InterContextChannel>>,
}

/// Tunables for the whole core.
#[derive(Debug, Clone, Default)]
pub struct SyncCoreConfig {
    pub session: SessionConfig,
    pub subscription_retry: RetryPolicy,
}

/// Hook invoked whenever the core decides the UI must land on sign-in.
pub type RedirectHook = Arc<dyn Fn() + Send + Sync>;

/// The client-side sync and consistency core.
pub struct SyncCore {
    auth: Arc<dyn AuthBackend>,
    remote: Arc<dyn RemoteStore>,
    session: Arc<SessionManager>,
    subscriptions: Arc<SubscriptionManager>,
    reconciler: Arc<ModeReconciler>,
    guest_store: Arc<GuestStore>,
    mirror: Arc<Mutex<Mirror>>,
    mutations: MutationGate,
    broadcast: Mutex<BroadcastSync>,
    redirect: RedirectHook,
}

impl SyncCore {
    pub fn new(backends: Backends, config: SyncCoreConfig, redirect: RedirectHook) -> Self {
        let session = Arc::new(SessionManager::new(
            backends.auth.clone(),
            backends.local.clone(),
            config.session,
        ));
        let subscriptions = Arc::new(SubscriptionManager::new(
            backends.transport.clone(),
            config.subscription_retry,
        ));
        let reconciler = Arc::new(ModeReconciler::new());
        let guest_store = Arc::new(GuestStore::new(backends.local.clone()));
        let mutations = MutationGate::new(
            reconciler.clone(),
            guest_store.clone(),
            backends.remote.clone(),
        );
        Self {
            auth: backends.auth,
            remote: backends.remote,
            session,
            subscriptions,
            reconciler,
            guest_store,
            mirror: Arc::new(Mutex::new(Mirror::new())),
            mutations,
            broadcast: Mutex::new(BroadcastSync::new(backends.channel)),
            redirect,
        }
    }

    fn lock_mirror(mirror: &Arc<Mutex<Mirror>>) -> std::sync::MutexGuard<'_, Mirror> {
        match mirror.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_broadcast(&self) -> std::sync::MutexGuard<'_, BroadcastSync> {
        match self.broadcast.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Recovers the session and reconciles the storage mode. Call once at
    /// process start; safe to call again on demand.
    pub async fn initialize(&self) -> SessionState {
        self.start_broadcast_listener();
        let state = self.session.recover_session().await;
        self.reconciler.apply_session_state(&state);
        state
    }

    fn start_broadcast_listener(&self) {
        let session = self.session.clone();
        let reconciler = self.reconciler.clone();
        let redirect = self.redirect.clone();
        let handler: BroadcastHandler = Arc::new(move |message| {
            // The message is a signal, not a snapshot: re-derive local state
            // here and do not publish anything back.
            match message {
                BroadcastMessage::Logout => {
                    session.mark_logged_out();
                    reconciler.enter_guest_mode();
                }
                BroadcastMessage::SessionExpired => {
                    session.clear_user_state();
                }
            }
            redirect();
        });
        self.lock_broadcast().listen(handler);
    }

    /// Explicit sign-in. Adopts the session and promotes the mode; guest
    /// data stays where it is.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<SessionState, AuthError> {
        let session = self.auth.sign_in(credentials).await?;
        self.session.adopt_user(session.user);
        let state = self.session.state();
        self.reconciler.apply_session_state(&state);
        Ok(state)
    }

    /// Explicit sign-up; behaves like sign-in on success.
    pub async fn sign_up(&self, credentials: &Credentials) -> Result<SessionState, AuthError> {
        let session = self.auth.sign_up(credentials).await?;
        self.session.adopt_user(session.user);
        let state = self.session.state();
        self.reconciler.apply_session_state(&state);
        Ok(state)
    }

    /// Explicit sign-out. The logout marker lands before the network call
    /// so a concurrent recovery cannot resurrect the session; the backend
    /// sign-out itself is best-effort.
    pub async fn sign_out(&self) {
        self.session.mark_logged_out();
        let _ = self.auth.sign_out().await;
        self.reconciler.enter_guest_mode();
        self.lock_broadcast().announce(BroadcastMessage::Logout);
        (self.redirect)();
    }

    /// Reacts to a detected (not chosen) session expiry: clears local user
    /// state, tells the other tabs, and redirects. The mode is left alone —
    /// guest data must not masquerade as the signed-in user's.
    pub fn session_expired(&self) {
        self.session.clear_user_state();
        self.lock_broadcast()
            .announce(BroadcastMessage::SessionExpired);
        (self.redirect)();
    }

    /// Registers a change-feed subscription. Gated on a ready, authenticated
    /// session — guests have nothing to subscribe to.
    pub fn subscribe(
        &self,
        config: SubscriptionConfig,
        callback: EventCallback,
        debounce: Option<DebounceSpec>,
    ) -> Result<String, SubscriptionError> {
        if !self.session.state().is_authenticated() {
            return Err(SubscriptionError::SessionNotReady);
        }
        Ok(self.subscriptions.subscribe(config, callback, debounce))
    }

    /// Replaces the mirror with a fresh snapshot from the remote store.
    pub async fn refresh_mirror(&self) -> Result<(), RemoteError> {
        let folders = self.remote.fetch_folders().await?;
        let links = self.remote.fetch_links().await?;
        let mut mirror = Self::lock_mirror(&self.mirror);
        mirror.replace_folders(folders);
        mirror.replace_links(links);
        Ok(())
    }

    /// Subscribes the folder and link feeds and applies their events to the
    /// shared mirror. Returns both subscription ids; same session gating as
    /// [`subscribe`](Self::subscribe).
    pub fn start_mirror_feeds(&self) -> Result<Vec<String>, SubscriptionError> {
        if !self.session.state().is_authenticated() {
            return Err(SubscriptionError::SessionNotReady);
        }

        let mirror = self.mirror.clone();
        let folder_events: EventCallback = Arc::new(move |event| {
            Self::lock_mirror(&mirror).apply_folder_event(&event);
        });
        let mirror = self.mirror.clone();
        let link_events: EventCallback = Arc::new(move |event| {
            Self::lock_mirror(&mirror).apply_link_event(&event);
        });

        Ok(vec![
            self.subscriptions
                .subscribe(SubscriptionConfig::all(FOLDERS_TABLE), folder_events, None),
            self.subscriptions
                .subscribe(SubscriptionConfig::all(LINKS_TABLE), link_events, None),
        ])
    }

    pub fn mirror(&self) -> &Arc<Mutex<Mirror>> {
        &self.mirror
    }

    pub fn active_mode(&self) -> StorageMode {
        self.reconciler.active_mode()
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn subscriptions(&self) -> &Arc<SubscriptionManager> {
        &self.subscriptions
    }

    pub fn reconciler(&self) -> &Arc<ModeReconciler> {
        &self.reconciler
    }

    pub fn guest_store(&self) -> &Arc<GuestStore> {
        &self.guest_store
    }

    pub fn mutations(&self) -> &MutationGate {
        &self.mutations
    }

    /// Stops the broadcast listener. Teardown failures cannot affect
    /// already-delivered messages.
    pub fn shutdown(&self) {
        self.lock_broadcast().shutdown();
    }
}
