//! Change-feed transport boundary.
//!
//! A transport turns a `(resource, filter)` pair into a live [`FeedConnection`]
//! that yields normalized change events until it is dropped or the connection
//! is lost. Connection loss arrives in-band as [`FeedMessage::Disconnected`]
//! so the subscription manager can distinguish it from a clean close.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;

use super::BoxFuture;
use crate::types::errors::TransportError;
use crate::types::events::ChangeEvent;
use crate::types::subscription::{EventFilter, SubscriptionConfig};

/// A message on a live feed.
#[derive(Debug)]
pub enum FeedMessage {
    Change(ChangeEvent),
    /// The transport lost the connection; the feed yields nothing further.
    Disconnected(TransportError),
}

/// A live handle to one change feed. Dropping it releases the connection.
pub struct FeedConnection {
    pub messages: mpsc::UnboundedReceiver<FeedMessage>,
}

/// Async transport boundary for change feeds.
pub trait ChangeFeedTransport: Send + Sync {
    fn connect<'a>(
        &'a self,
        config: &'a SubscriptionConfig,
    ) -> BoxFuture<'a, Result<FeedConnection, TransportError>>;
}

// === InMemoryTransport ===

struct Feed {
    resource: String,
    filter: EventFilter,
    sender: mpsc::UnboundedSender<FeedMessage>,
}

/// In-process transport for tests and the demo binary.
///
/// Events pushed with [`emit`](InMemoryTransport::emit) fan out to every
/// connection whose resource and filter match. `fail_next_connects` and
/// `drop_connections` simulate transport failures.
#[derive(Default)]
pub struct InMemoryTransport {
    feeds: Mutex<Vec<Feed>>,
    connect_failures: AtomicU32,
    connects: AtomicU32,
    attempts: AtomicU32,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` connection attempts fail with a handshake error.
    pub fn fail_next_connects(&self, n: u32) {
        self.connect_failures.store(n, Ordering::SeqCst);
    }

    /// Total number of successful connections since construction.
    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    /// Total number of connection attempts, successful or not.
    pub fn connect_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Delivers an event to every matching live feed.
    pub fn emit(&self, resource: &str, event: ChangeEvent) {
        let mut feeds = match self.feeds.lock() {
            Ok(feeds) => feeds,
            Err(poisoned) => poisoned.into_inner(),
        };
        feeds.retain(|feed| {
            if feed.resource != resource || !feed.filter.matches(event.event_type) {
                return !feed.sender.is_closed();
            }
            feed.sender.send(FeedMessage::Change(event.clone())).is_ok()
        });
    }

    /// Severs every live feed on the given resource.
    pub fn drop_connections(&self, resource: &str) {
        let mut feeds = match self.feeds.lock() {
            Ok(feeds) => feeds,
            Err(poisoned) => poisoned.into_inner(),
        };
        feeds.retain(|feed| {
            if feed.resource != resource {
                return true;
            }
            let _ = feed.sender.send(FeedMessage::Disconnected(
                TransportError::ConnectionLost("connection dropped".to_string()),
            ));
            false
        });
    }
}

impl ChangeFeedTransport for InMemoryTransport {
    fn connect<'a>(
        &'a self,
        config: &'a SubscriptionConfig,
    ) -> BoxFuture<'a, Result<FeedConnection, TransportError>> {
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let failures = self.connect_failures.load(Ordering::SeqCst);
            if failures > 0 {
                self.connect_failures.store(failures - 1, Ordering::SeqCst);
                return Err(TransportError::HandshakeFailed(
                    "simulated handshake failure".to_string(),
                ));
            }
            let (sender, messages) = mpsc::unbounded_channel();
            let mut feeds = match self.feeds.lock() {
                Ok(feeds) => feeds,
                Err(poisoned) => poisoned.into_inner(),
            };
            feeds.push(Feed {
                resource: config.resource.clone(),
                filter: config.filter.clone(),
                sender,
            });
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(FeedConnection { messages })
        })
    }
}
