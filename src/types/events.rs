use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of row change a feed reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeEventType {
    Insert,
    Update,
    Delete,
}

/// A normalized change record delivered by a change feed.
///
/// `before`/`after` carry the raw row images as JSON; deletes usually only
/// have a `before` image, inserts only an `after`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    pub event_type: ChangeEventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,
}

impl ChangeEvent {
    pub fn insert(after: Value) -> Self {
        Self {
            event_type: ChangeEventType::Insert,
            before: None,
            after: Some(after),
        }
    }

    pub fn update(before: Option<Value>, after: Value) -> Self {
        Self {
            event_type: ChangeEventType::Update,
            before,
            after: Some(after),
        }
    }

    pub fn delete(before: Value) -> Self {
        Self {
            event_type: ChangeEventType::Delete,
            before: Some(before),
            after: None,
        }
    }
}

/// A tagged message on the inter-context channel.
///
/// A broadcast is a signal, not a snapshot: receivers re-derive their own
/// state instead of trusting the message as a state transfer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BroadcastMessage {
    Logout,
    SessionExpired,
}
