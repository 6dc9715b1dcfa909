use std::fmt;

// === HierarchyViolation ===

/// Rejection reasons for folder mutations that would break hierarchy invariants.
///
/// These are synchronous rejections raised at the mutation boundary; a
/// violating mutation is never forwarded to any storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HierarchyViolation {
    /// Re-parenting the folder would make the tree cyclic.
    CycleDetected(String),
    /// The move or creation would exceed the one-level nesting cap.
    NestingTooDeep(String),
    /// The target parent already holds the maximum number of sub-folders.
    ChildQuotaExceeded(String),
}

impl fmt::Display for HierarchyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HierarchyViolation::CycleDetected(id) => {
                write!(f, "Re-parenting folder {} would create a cycle", id)
            }
            HierarchyViolation::NestingTooDeep(id) => {
                write!(f, "Folder {} would exceed the one-level nesting cap", id)
            }
            HierarchyViolation::ChildQuotaExceeded(id) => {
                write!(f, "Folder {} already holds the maximum number of sub-folders", id)
            }
        }
    }
}

impl std::error::Error for HierarchyViolation {}

// === AuthError ===

/// Errors from the credential/session backend.
#[derive(Debug)]
pub enum AuthError {
    /// Credentials were rejected or have expired.
    Unauthorized,
    /// No stored credentials to act on.
    MissingCredentials,
    /// A network error occurred talking to the backend.
    Network(String),
    /// The backend returned an unexpected response.
    Backend(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Unauthorized => write!(f, "Credentials rejected or expired"),
            AuthError::MissingCredentials => write!(f, "No stored credentials"),
            AuthError::Network(msg) => write!(f, "Auth network error: {}", msg),
            AuthError::Backend(msg) => write!(f, "Auth backend error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

// === SessionError ===

/// Non-fatal errors surfaced by session recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Recovery hit its hard ceiling and resolved to "no user".
    RecoveryTimeout,
    /// The credential backend failed during recovery.
    Backend(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::RecoveryTimeout => write!(f, "Session recovery timed out"),
            SessionError::Backend(msg) => write!(f, "Session backend error: {}", msg),
        }
    }
}

impl std::error::Error for SessionError {}

// === TransportError ===

/// Errors from the change-feed transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The subscription handshake failed.
    HandshakeFailed(String),
    /// An established connection dropped.
    ConnectionLost(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::HandshakeFailed(msg) => {
                write!(f, "Feed handshake failed: {}", msg)
            }
            TransportError::ConnectionLost(msg) => write!(f, "Feed connection lost: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

// === SubscriptionError ===

/// Errors related to subscription registry operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// Subscription with the given ID was not found.
    NotFound(String),
    /// Subscriptions require a ready, authenticated session.
    SessionNotReady,
}

impl fmt::Display for SubscriptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionError::NotFound(id) => write!(f, "Subscription not found: {}", id),
            SubscriptionError::SessionNotReady => {
                write!(f, "Session is not ready for subscriptions")
            }
        }
    }
}

impl std::error::Error for SubscriptionError {}

// === StorageError ===

/// Errors from the local persistent key-value store.
#[derive(Debug)]
pub enum StorageError {
    /// The underlying store failed.
    Backend(String),
    /// Stored data could not be serialized or deserialized.
    Serialization(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Backend(msg) => write!(f, "Local storage error: {}", msg),
            StorageError::Serialization(msg) => {
                write!(f, "Local storage serialization error: {}", msg)
            }
        }
    }
}

impl std::error::Error for StorageError {}

// === BroadcastError ===

/// Errors from the inter-context channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    /// The runtime provides no inter-context channel.
    Unavailable,
    /// Publishing a message failed.
    Publish(String),
}

impl fmt::Display for BroadcastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BroadcastError::Unavailable => write!(f, "Inter-context channel unavailable"),
            BroadcastError::Publish(msg) => write!(f, "Broadcast publish failed: {}", msg),
        }
    }
}

impl std::error::Error for BroadcastError {}

// === RemoteError ===

/// Errors from the remote row store.
#[derive(Debug)]
pub enum RemoteError {
    /// The request was rejected for lack of valid credentials.
    Unauthorized,
    /// A network error occurred.
    Network(String),
    /// The remote API returned an error response.
    Api(String),
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::Unauthorized => write!(f, "Remote store rejected the credentials"),
            RemoteError::Network(msg) => write!(f, "Remote store network error: {}", msg),
            RemoteError::Api(msg) => write!(f, "Remote store API error: {}", msg),
        }
    }
}

impl std::error::Error for RemoteError {}

// === MutationError ===

/// Errors raised at the validated mutation boundary.
#[derive(Debug)]
pub enum MutationError {
    /// The mutation would violate a hierarchy invariant; nothing was forwarded.
    Invariant(HierarchyViolation),
    /// The referenced folder does not exist in the caller's snapshot.
    FolderNotFound(String),
    /// Guest-mode storage failed.
    Storage(String),
    /// The remote store rejected or failed the forwarded mutation.
    Remote(String),
}

impl fmt::Display for MutationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationError::Invariant(violation) => write!(f, "{}", violation),
            MutationError::FolderNotFound(id) => write!(f, "Folder not found: {}", id),
            MutationError::Storage(msg) => write!(f, "Mutation storage error: {}", msg),
            MutationError::Remote(msg) => write!(f, "Mutation remote error: {}", msg),
        }
    }
}

impl std::error::Error for MutationError {}
