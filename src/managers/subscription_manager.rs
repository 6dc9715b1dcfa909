//! Realtime subscription manager.
//!
//! Owns every live change-feed in one execution context: a registry of
//! subscriptions keyed by id, each backed by a task that pumps its transport
//! connection, coalesces events per its debounce spec, and reconnects with
//! bounded backoff when the transport drops. Side effects stop at the
//! transport boundary — events are only forwarded to the caller's callback,
//! never applied to application data here.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::time::Instant;
use uuid::Uuid;

use crate::backend::feed::{ChangeFeedTransport, FeedConnection, FeedMessage};
use crate::services::retry::RetryPolicy;
use crate::types::errors::SubscriptionError;
use crate::types::events::ChangeEvent;
use crate::types::subscription::{DebounceSpec, SubscriptionConfig, SubscriptionState};

/// Callback receiving normalized change events.
pub type EventCallback = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

/// Handle for a group of subscriptions registered together.
#[derive(Debug, Clone)]
pub struct SubscriptionBatch {
    pub id: String,
    pub subscription_ids: Vec<String>,
}

struct Registration {
    state: Arc<Mutex<SubscriptionState>>,
    paused: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
    /// An inert slot has no worker or transport behind it.
    inert: bool,
}

/// Registry of live change-feed subscriptions.
pub struct SubscriptionManager {
    transport: Arc<dyn ChangeFeedTransport>,
    retry_policy: RetryPolicy,
    registry: Mutex<HashMap<String, Registration>>,
}

impl SubscriptionManager {
    pub fn new(transport: Arc<dyn ChangeFeedTransport>, retry_policy: RetryPolicy) -> Self {
        Self {
            transport,
            retry_policy,
            registry: Mutex::new(HashMap::new()),
        }
    }

    fn lock_registry(&self) -> MutexGuard<'_, HashMap<String, Registration>> {
        match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Registers a live feed and returns its subscription id.
    ///
    /// Must be called from within a tokio runtime: the feed is pumped by a
    /// spawned task.
    pub fn subscribe(
        &self,
        config: SubscriptionConfig,
        callback: EventCallback,
        debounce: Option<DebounceSpec>,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let state = Arc::new(Mutex::new(SubscriptionState::Active));
        let paused = Arc::new(AtomicBool::new(false));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = FeedWorker {
            transport: self.transport.clone(),
            config,
            callback,
            debounce,
            state: state.clone(),
            paused: paused.clone(),
            retry_policy: self.retry_policy.clone(),
        };
        tokio::spawn(worker.run(shutdown_rx));

        self.lock_registry().insert(
            id.clone(),
            Registration {
                state,
                paused,
                shutdown: shutdown_tx,
                inert: false,
            },
        );
        id
    }

    /// Registers several feeds sharing one callback. Tearing the batch down
    /// via [`unsubscribe_batch`](Self::unsubscribe_batch) removes every
    /// member; none can leak.
    pub fn subscribe_many(
        &self,
        configs: Vec<SubscriptionConfig>,
        callback: EventCallback,
        debounce: Option<DebounceSpec>,
    ) -> SubscriptionBatch {
        let batch_id = Uuid::new_v4().to_string();
        let subscription_ids = configs
            .into_iter()
            .map(|config| self.subscribe(config, callback.clone(), debounce.clone()))
            .collect();
        SubscriptionBatch {
            id: batch_id,
            subscription_ids,
        }
    }

    /// Registers a feed whose config is computed lazily. A `None` config
    /// parks the slot inert — no transport, no delivery, nothing to resume.
    pub fn subscribe_when<F>(
        &self,
        config: F,
        callback: EventCallback,
        debounce: Option<DebounceSpec>,
    ) -> String
    where
        F: FnOnce() -> Option<SubscriptionConfig>,
    {
        match config() {
            Some(config) => self.subscribe(config, callback, debounce),
            None => {
                let id = Uuid::new_v4().to_string();
                let (shutdown_tx, _) = watch::channel(false);
                self.lock_registry().insert(
                    id.clone(),
                    Registration {
                        state: Arc::new(Mutex::new(SubscriptionState::Paused)),
                        paused: Arc::new(AtomicBool::new(true)),
                        shutdown: shutdown_tx,
                        inert: true,
                    },
                );
                id
            }
        }
    }

    /// Stops callback delivery without tearing down the transport.
    pub fn pause_subscription(&self, subscription_id: &str) -> Result<(), SubscriptionError> {
        let registry = self.lock_registry();
        let registration = registry
            .get(subscription_id)
            .ok_or_else(|| SubscriptionError::NotFound(subscription_id.to_string()))?;
        registration.paused.store(true, Ordering::Release);
        set_state_if(&registration.state, SubscriptionState::Active, SubscriptionState::Paused);
        Ok(())
    }

    /// Restarts callback delivery on a paused subscription.
    pub fn resume_subscription(&self, subscription_id: &str) -> Result<(), SubscriptionError> {
        let registry = self.lock_registry();
        let registration = registry
            .get(subscription_id)
            .ok_or_else(|| SubscriptionError::NotFound(subscription_id.to_string()))?;
        if registration.inert {
            return Ok(());
        }
        registration.paused.store(false, Ordering::Release);
        set_state_if(&registration.state, SubscriptionState::Paused, SubscriptionState::Active);
        Ok(())
    }

    /// Releases the transport connection and all timers. Terminal, and safe
    /// to call any number of times.
    pub fn unsubscribe(&self, subscription_id: &str) {
        let registration = self.lock_registry().remove(subscription_id);
        if let Some(registration) = registration {
            let _ = registration.shutdown.send(true);
        }
    }

    /// Tears down every member of a batch. Members are drained from the
    /// registry under one lock so a partial teardown cannot leak.
    pub fn unsubscribe_batch(&self, batch: &SubscriptionBatch) {
        let removed: Vec<Registration> = {
            let mut registry = self.lock_registry();
            batch
                .subscription_ids
                .iter()
                .filter_map(|id| registry.remove(id))
                .collect()
        };
        for registration in removed {
            let _ = registration.shutdown.send(true);
        }
    }

    /// Current state of a subscription, or `None` after unsubscribe.
    pub fn subscription_state(&self, subscription_id: &str) -> Option<SubscriptionState> {
        let registry = self.lock_registry();
        registry.get(subscription_id).map(|registration| {
            match registration.state.lock() {
                Ok(state) => *state,
                Err(poisoned) => *poisoned.into_inner(),
            }
        })
    }

    pub fn subscription_count(&self) -> usize {
        self.lock_registry().len()
    }
}

fn set_state(state: &Arc<Mutex<SubscriptionState>>, next: SubscriptionState) {
    let mut guard = match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    // Closed is terminal; a winding-down worker must not resurrect the slot.
    if *guard != SubscriptionState::Closed {
        *guard = next;
    }
}

fn set_state_if(
    state: &Arc<Mutex<SubscriptionState>>,
    expected: SubscriptionState,
    next: SubscriptionState,
) {
    let mut guard = match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if *guard == expected {
        *guard = next;
    }
}

enum PumpExit {
    Shutdown,
    Disconnected,
}

/// Per-subscription worker: owns the connection, the debounce timers, and
/// the reconnect loop.
struct FeedWorker {
    transport: Arc<dyn ChangeFeedTransport>,
    config: SubscriptionConfig,
    callback: EventCallback,
    debounce: Option<DebounceSpec>,
    state: Arc<Mutex<SubscriptionState>>,
    paused: Arc<AtomicBool>,
    retry_policy: RetryPolicy,
}

impl FeedWorker {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut attempt: u32 = 0;
        loop {
            if *shutdown.borrow() {
                set_state(&self.state, SubscriptionState::Closed);
                return;
            }

            let connected = tokio::select! {
                result = self.transport.connect(&self.config) => result,
                _ = shutdown.changed() => {
                    set_state(&self.state, SubscriptionState::Closed);
                    return;
                }
            };

            if let Ok(connection) = connected {
                let resumed_state = if self.paused.load(Ordering::Acquire) {
                    SubscriptionState::Paused
                } else {
                    SubscriptionState::Active
                };
                set_state(&self.state, resumed_state);
                match self.pump(connection, &mut shutdown, &mut attempt).await {
                    PumpExit::Shutdown => {
                        set_state(&self.state, SubscriptionState::Closed);
                        return;
                    }
                    PumpExit::Disconnected => {}
                }
            }

            attempt += 1;
            if attempt > self.retry_policy.max_retries {
                set_state(&self.state, SubscriptionState::Failed);
                return;
            }
            set_state(&self.state, SubscriptionState::Retrying);
            let delay = self.retry_policy.delay_for(attempt - 1);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => {
                    set_state(&self.state, SubscriptionState::Closed);
                    return;
                }
            }
        }
    }

    fn deliver(&self, event: ChangeEvent, attempt: &mut u32) {
        (self.callback)(event);
        // A successful delivery proves the feed healthy again.
        *attempt = 0;
    }

    async fn pump(
        &self,
        mut connection: FeedConnection,
        shutdown: &mut watch::Receiver<bool>,
        attempt: &mut u32,
    ) -> PumpExit {
        let mut pending: Option<ChangeEvent> = None;
        // Trailing-edge deadline, reset by every event in the burst.
        let mut quiet_deadline: Option<Instant> = None;
        // max_wait ceiling, fixed when the burst window opens.
        let mut hard_deadline: Option<Instant> = None;

        loop {
            let timer_deadline = match (quiet_deadline, hard_deadline) {
                (Some(quiet), Some(hard)) => Some(quiet.min(hard)),
                (Some(quiet), None) => Some(quiet),
                _ => None,
            };

            tokio::select! {
                message = connection.messages.recv() => match message {
                    Some(FeedMessage::Change(event)) => {
                        if self.paused.load(Ordering::Acquire) {
                            // Paused: drop the raw event and any pending delivery.
                            pending = None;
                            quiet_deadline = None;
                            hard_deadline = None;
                            continue;
                        }
                        match &self.debounce {
                            None => self.deliver(event, attempt),
                            Some(spec) => {
                                let now = Instant::now();
                                if quiet_deadline.is_none() {
                                    // First event of a burst.
                                    if let Some(max_wait) = spec.max_wait {
                                        hard_deadline = Some(now + max_wait);
                                    }
                                    if spec.leading {
                                        self.deliver(event, attempt);
                                    } else {
                                        pending = Some(event);
                                    }
                                } else {
                                    pending = Some(event);
                                }
                                quiet_deadline = Some(now + spec.delay);
                            }
                        }
                    }
                    Some(FeedMessage::Disconnected(_)) | None => {
                        return PumpExit::Disconnected;
                    }
                },
                _ = tokio::time::sleep_until(timer_deadline.unwrap_or_else(Instant::now)),
                        if timer_deadline.is_some() => {
                    if let Some(event) = pending.take() {
                        if !self.paused.load(Ordering::Acquire) {
                            self.deliver(event, attempt);
                        }
                    }
                    quiet_deadline = None;
                    hard_deadline = None;
                },
                _ = shutdown.changed() => return PumpExit::Shutdown,
            }
        }
    }
}
