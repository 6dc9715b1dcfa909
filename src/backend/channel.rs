//! Inter-context broadcast channel boundary.
//!
//! Tabs/windows of the same client share no memory; the channel is the only
//! direct path between them and it is best-effort. Availability is
//! environment-dependent, so everything above this boundary treats the
//! channel as optional.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{broadcast, mpsc};

use crate::types::errors::BroadcastError;
use crate::types::events::BroadcastMessage;

/// Publish/subscribe of small tagged messages to other same-origin contexts.
///
/// A context never receives its own messages back.
pub trait InterContextChannel: Send + Sync {
    fn publish(&self, message: &BroadcastMessage) -> Result<(), BroadcastError>;

    /// Opens a stream of messages published by other contexts.
    fn listen(&self) -> mpsc::UnboundedReceiver<BroadcastMessage>;
}

// === InProcessChannelHub ===

/// In-process hub standing in for an environment broadcast channel.
///
/// Each simulated context takes a [`handle`](InProcessChannelHub::handle);
/// messages published on one handle reach every other handle.
pub struct InProcessChannelHub {
    sender: broadcast::Sender<(u64, BroadcastMessage)>,
    next_id: AtomicU64,
}

impl InProcessChannelHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self {
            sender,
            next_id: AtomicU64::new(0),
        }
    }

    pub fn handle(&self) -> InProcessChannel {
        InProcessChannel {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            sender: self.sender.clone(),
        }
    }
}

impl Default for InProcessChannelHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One context's handle onto the hub.
pub struct InProcessChannel {
    id: u64,
    sender: broadcast::Sender<(u64, BroadcastMessage)>,
}

impl InterContextChannel for InProcessChannel {
    fn publish(&self, message: &BroadcastMessage) -> Result<(), BroadcastError> {
        // A send with no listeners is not an error: broadcast is best-effort.
        let _ = self.sender.send((self.id, *message));
        Ok(())
    }

    fn listen(&self) -> mpsc::UnboundedReceiver<BroadcastMessage> {
        let mut source = self.sender.subscribe();
        let own_id = self.id;
        let (forward, received) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            loop {
                match source.recv().await {
                    Ok((origin, message)) => {
                        if origin == own_id {
                            continue;
                        }
                        if forward.send(message).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        received
    }
}
