use linkstash::types::errors::*;

// === HierarchyViolation Tests ===

#[test]
fn hierarchy_cycle_display() {
    let err = HierarchyViolation::CycleDetected("folder-1".to_string());
    assert_eq!(
        err.to_string(),
        "Re-parenting folder folder-1 would create a cycle"
    );
}

#[test]
fn hierarchy_quota_display() {
    let err = HierarchyViolation::ChildQuotaExceeded("folder-1".to_string());
    assert_eq!(
        err.to_string(),
        "Folder folder-1 already holds the maximum number of sub-folders"
    );
}

#[test]
fn hierarchy_violation_implements_error_trait() {
    let err: Box<dyn std::error::Error> =
        Box::new(HierarchyViolation::NestingTooDeep("f".to_string()));
    assert!(err.source().is_none());
}

// === AuthError Tests ===

#[test]
fn auth_unauthorized_display() {
    assert_eq!(
        AuthError::Unauthorized.to_string(),
        "Credentials rejected or expired"
    );
}

#[test]
fn auth_network_display() {
    let err = AuthError::Network("timeout".to_string());
    assert_eq!(err.to_string(), "Auth network error: timeout");
}

// === SessionError Tests ===

#[test]
fn session_timeout_display() {
    assert_eq!(
        SessionError::RecoveryTimeout.to_string(),
        "Session recovery timed out"
    );
}

// === TransportError Tests ===

#[test]
fn transport_connection_lost_display() {
    let err = TransportError::ConnectionLost("reset by peer".to_string());
    assert_eq!(err.to_string(), "Feed connection lost: reset by peer");
}

// === SubscriptionError Tests ===

#[test]
fn subscription_not_found_display() {
    let err = SubscriptionError::NotFound("sub-1".to_string());
    assert_eq!(err.to_string(), "Subscription not found: sub-1");
}

#[test]
fn subscription_session_not_ready_display() {
    assert_eq!(
        SubscriptionError::SessionNotReady.to_string(),
        "Session is not ready for subscriptions"
    );
}

// === StorageError Tests ===

#[test]
fn storage_serialization_display() {
    let err = StorageError::Serialization("bad json".to_string());
    assert_eq!(
        err.to_string(),
        "Local storage serialization error: bad json"
    );
}

// === MutationError Tests ===

#[test]
fn mutation_invariant_display_forwards_the_violation() {
    let err = MutationError::Invariant(HierarchyViolation::CycleDetected("f".to_string()));
    assert_eq!(err.to_string(), "Re-parenting folder f would create a cycle");
}

#[test]
fn mutation_folder_not_found_display() {
    let err = MutationError::FolderNotFound("f-9".to_string());
    assert_eq!(err.to_string(), "Folder not found: f-9");
}

// === RemoteError Tests ===

#[test]
fn remote_unauthorized_display() {
    assert_eq!(
        RemoteError::Unauthorized.to_string(),
        "Remote store rejected the credentials"
    );
}

// === BroadcastError Tests ===

#[test]
fn broadcast_unavailable_display() {
    assert_eq!(
        BroadcastError::Unavailable.to_string(),
        "Inter-context channel unavailable"
    );
}
