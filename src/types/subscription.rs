use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::events::ChangeEventType;

/// Identifies a change feed: a remote resource plus an event filter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionConfig {
    /// Table/stream name on the backend.
    pub resource: String,
    pub filter: EventFilter,
}

impl SubscriptionConfig {
    pub fn all(resource: &str) -> Self {
        Self {
            resource: resource.to_string(),
            filter: EventFilter::default(),
        }
    }
}

/// Server-side filter for a change feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EventFilter {
    /// Restrict to one event type; `None` means all.
    pub event: Option<ChangeEventType>,
    /// Row predicate in `column=eq.value` form, applied by the backend.
    pub predicate: Option<String>,
}

impl EventFilter {
    pub fn only(event: ChangeEventType) -> Self {
        Self {
            event: Some(event),
            predicate: None,
        }
    }

    pub fn matches(&self, event_type: ChangeEventType) -> bool {
        match self.event {
            Some(wanted) => wanted == event_type,
            None => true,
        }
    }
}

/// Coalescing configuration for a subscription.
///
/// Raw events within `delay` of each other collapse into one trailing-edge
/// delivery carrying the last event. `max_wait` forces a delivery even under
/// continuous event pressure; `leading` additionally delivers the first
/// event of a burst immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebounceSpec {
    pub delay: Duration,
    pub max_wait: Option<Duration>,
    pub leading: bool,
}

impl DebounceSpec {
    /// Plain trailing-edge debounce.
    pub fn trailing(delay: Duration) -> Self {
        Self {
            delay,
            max_wait: None,
            leading: false,
        }
    }
}

/// Lifecycle state of one registered subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Active,
    Paused,
    Retrying,
    /// Reconnect attempts exhausted; terminal.
    Failed,
    /// Unsubscribed; terminal.
    Closed,
}
