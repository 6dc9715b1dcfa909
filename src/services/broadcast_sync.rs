//! Cross-tab/process broadcast sync.
//!
//! Fans authoritative, locally-observed events (logout, session expiry) out
//! to other execution contexts of the same client, and applies the same
//! events when they arrive from elsewhere. The channel is strictly a
//! best-effort enhancement: when the runtime provides none, a single
//! context behaves identically.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::backend::channel::InterContextChannel;
use crate::types::events::BroadcastMessage;

/// Handler invoked for every message received from another context.
pub type BroadcastHandler = Arc<dyn Fn(BroadcastMessage) + Send + Sync>;

/// Owns this context's side of the inter-context channel.
pub struct BroadcastSync {
    channel: Option<Arc<dyn InterContextChannel>>,
    listener: Option<JoinHandle<()>>,
}

impl BroadcastSync {
    pub fn new(channel: Option<Arc<dyn InterContextChannel>>) -> Self {
        Self {
            channel,
            listener: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.channel.is_some()
    }

    /// Publishes a message to other contexts. Best-effort: a missing channel
    /// or a failed publish never affects local behavior.
    pub fn announce(&self, message: BroadcastMessage) {
        if let Some(channel) = &self.channel {
            let _ = channel.publish(&message);
        }
    }

    /// Starts delivering messages from other contexts to `handler`,
    /// replacing any previous listener.
    pub fn listen(&mut self, handler: BroadcastHandler) {
        let channel = match &self.channel {
            Some(channel) => channel.clone(),
            None => return,
        };
        self.shutdown();
        let mut received = channel.listen();
        self.listener = Some(tokio::spawn(async move {
            while let Some(message) = received.recv().await {
                handler(message);
            }
        }));
    }

    /// Stops the listener. Messages already delivered are unaffected.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.listener.take() {
            task.abort();
        }
    }
}

impl Drop for BroadcastSync {
    fn drop(&mut self) {
        self.shutdown();
    }
}
