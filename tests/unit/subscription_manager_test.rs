use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use linkstash::backend::feed::InMemoryTransport;
use linkstash::managers::subscription_manager::{EventCallback, SubscriptionManager};
use linkstash::services::retry::RetryPolicy;
use linkstash::types::events::ChangeEvent;
use linkstash::types::subscription::{DebounceSpec, SubscriptionConfig, SubscriptionState};

fn collector() -> (EventCallback, Arc<Mutex<Vec<ChangeEvent>>>) {
    let received: Arc<Mutex<Vec<ChangeEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let callback: EventCallback = Arc::new(move |event| {
        sink.lock().expect("collector poisoned").push(event);
    });
    (callback, received)
}

fn event(id: &str) -> ChangeEvent {
    ChangeEvent::insert(serde_json::json!({ "id": id }))
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        multiplier: 2.0,
    }
}

/// Gives the spawned worker time to finish its transport handshake.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test]
async fn test_events_deliver_in_arrival_order_without_debounce() {
    let transport = Arc::new(InMemoryTransport::new());
    let mgr = SubscriptionManager::new(transport.clone(), fast_policy());
    let (callback, received) = collector();

    let id = mgr.subscribe(SubscriptionConfig::all("links"), callback, None);
    settle().await;

    transport.emit("links", event("a"));
    transport.emit("links", event("b"));
    transport.emit("links", event("c"));
    settle().await;

    let events = received.lock().expect("poisoned");
    let ids: Vec<_> = events
        .iter()
        .filter_map(|e| e.after.as_ref()?.get("id")?.as_str().map(str::to_string))
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    drop(events);
    mgr.unsubscribe(&id);
}

#[tokio::test]
async fn test_debounce_coalesces_burst_into_last_event() {
    let transport = Arc::new(InMemoryTransport::new());
    let mgr = SubscriptionManager::new(transport.clone(), fast_policy());
    let (callback, received) = collector();

    mgr.subscribe(
        SubscriptionConfig::all("links"),
        callback,
        Some(DebounceSpec::trailing(Duration::from_millis(100))),
    );
    settle().await;

    for i in 0..5 {
        transport.emit("links", event(&format!("e{}", i)));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(300)).await;

    let events = received.lock().expect("poisoned");
    assert_eq!(events.len(), 1, "burst must coalesce into one delivery");
    let delivered_id = events[0]
        .after
        .as_ref()
        .and_then(|row| row.get("id"))
        .and_then(|id| id.as_str());
    assert_eq!(delivered_id, Some("e4"), "delivery carries the last event");
}

#[tokio::test]
async fn test_debounce_max_wait_forces_delivery_under_pressure() {
    let transport = Arc::new(InMemoryTransport::new());
    let mgr = SubscriptionManager::new(transport.clone(), fast_policy());
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = delivered.clone();

    mgr.subscribe(
        SubscriptionConfig::all("links"),
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
        Some(DebounceSpec {
            delay: Duration::from_millis(50),
            max_wait: Some(Duration::from_millis(100)),
            leading: false,
        }),
    );
    settle().await;

    // Continuous pressure: every gap is shorter than the quiet period.
    for i in 0..8 {
        transport.emit("links", event(&format!("e{}", i)));
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Without max_wait there would be exactly one delivery at the end.
    assert!(
        delivered.load(Ordering::SeqCst) >= 2,
        "max_wait must force deliveries during the burst"
    );
}

#[tokio::test]
async fn test_debounce_leading_edge_delivers_first_event_immediately() {
    let transport = Arc::new(InMemoryTransport::new());
    let mgr = SubscriptionManager::new(transport.clone(), fast_policy());
    let (callback, received) = collector();

    mgr.subscribe(
        SubscriptionConfig::all("links"),
        callback,
        Some(DebounceSpec {
            delay: Duration::from_millis(100),
            max_wait: None,
            leading: true,
        }),
    );
    settle().await;

    transport.emit("links", event("first"));
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(
        received.lock().expect("poisoned").len(),
        1,
        "leading edge delivers before the quiet period"
    );

    transport.emit("links", event("second"));
    transport.emit("links", event("third"));
    tokio::time::sleep(Duration::from_millis(300)).await;

    let events = received.lock().expect("poisoned");
    assert_eq!(events.len(), 2, "leading plus one trailing delivery");
    let last_id = events[1]
        .after
        .as_ref()
        .and_then(|row| row.get("id"))
        .and_then(|id| id.as_str());
    assert_eq!(last_id, Some("third"));
}

#[tokio::test]
async fn test_pause_stops_delivery_and_resume_restarts_without_reconnect() {
    let transport = Arc::new(InMemoryTransport::new());
    let mgr = SubscriptionManager::new(transport.clone(), fast_policy());
    let (callback, received) = collector();

    let id = mgr.subscribe(SubscriptionConfig::all("links"), callback, None);
    settle().await;

    transport.emit("links", event("a"));
    settle().await;
    assert_eq!(received.lock().expect("poisoned").len(), 1);

    mgr.pause_subscription(&id).expect("pause failed");
    assert_eq!(mgr.subscription_state(&id), Some(SubscriptionState::Paused));
    transport.emit("links", event("dropped"));
    settle().await;
    assert_eq!(received.lock().expect("poisoned").len(), 1);

    mgr.resume_subscription(&id).expect("resume failed");
    assert_eq!(mgr.subscription_state(&id), Some(SubscriptionState::Active));
    transport.emit("links", event("b"));
    settle().await;
    assert_eq!(received.lock().expect("poisoned").len(), 2);

    // Pause/resume never re-handshakes the transport.
    assert_eq!(transport.connect_count(), 1);
}

#[tokio::test]
async fn test_unsubscribe_is_idempotent_and_terminal() {
    let transport = Arc::new(InMemoryTransport::new());
    let mgr = SubscriptionManager::new(transport.clone(), fast_policy());
    let (callback, received) = collector();

    let id = mgr.subscribe(SubscriptionConfig::all("links"), callback, None);
    settle().await;

    mgr.unsubscribe(&id);
    mgr.unsubscribe(&id);
    assert_eq!(mgr.subscription_state(&id), None);

    settle().await;
    transport.emit("links", event("after-close"));
    settle().await;
    assert!(received.lock().expect("poisoned").is_empty());
}

#[tokio::test]
async fn test_reconnects_with_backoff_after_drop() {
    let transport = Arc::new(InMemoryTransport::new());
    let mgr = SubscriptionManager::new(transport.clone(), fast_policy());
    let (callback, received) = collector();

    mgr.subscribe(SubscriptionConfig::all("links"), callback, None);
    settle().await;
    assert_eq!(transport.connect_count(), 1);

    transport.drop_connections("links");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.connect_count(), 2, "worker must reconnect");

    transport.emit("links", event("after-reconnect"));
    settle().await;
    assert_eq!(received.lock().expect("poisoned").len(), 1);
}

#[tokio::test]
async fn test_exceeding_max_retries_fails_terminally() {
    let transport = Arc::new(InMemoryTransport::new());
    let policy = RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(20),
        multiplier: 2.0,
    };
    let mgr = SubscriptionManager::new(transport.clone(), policy);
    let (callback, _received) = collector();

    transport.fail_next_connects(100);
    let id = mgr.subscribe(SubscriptionConfig::all("links"), callback, None);
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(mgr.subscription_state(&id), Some(SubscriptionState::Failed));
    // Initial attempt plus two retries, then nothing.
    assert_eq!(transport.connect_attempts(), 3);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.connect_attempts(), 3);
}

#[tokio::test]
async fn test_successful_delivery_resets_retry_counter() {
    let transport = Arc::new(InMemoryTransport::new());
    let policy = RetryPolicy {
        max_retries: 1,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(10),
        multiplier: 1.0,
    };
    let mgr = SubscriptionManager::new(transport.clone(), policy);
    let (callback, _received) = collector();

    let id = mgr.subscribe(SubscriptionConfig::all("links"), callback, None);
    settle().await;

    // First drop consumes the single allowed retry...
    transport.drop_connections("links");
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(transport.connect_count(), 2);

    // ...but a delivery on the new connection resets the counter,
    transport.emit("links", event("healthy"));
    settle().await;

    // so a second drop is survivable too.
    transport.drop_connections("links");
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(transport.connect_count(), 3);
    assert_eq!(mgr.subscription_state(&id), Some(SubscriptionState::Active));
}

#[tokio::test]
async fn test_batch_teardown_removes_every_member() {
    let transport = Arc::new(InMemoryTransport::new());
    let mgr = SubscriptionManager::new(transport.clone(), fast_policy());
    let (callback, received) = collector();

    let batch = mgr.subscribe_many(
        vec![
            SubscriptionConfig::all("links"),
            SubscriptionConfig::all("folders"),
            SubscriptionConfig::all("profiles"),
        ],
        callback,
        None,
    );
    settle().await;
    assert_eq!(batch.subscription_ids.len(), 3);
    assert_eq!(mgr.subscription_count(), 3);

    mgr.unsubscribe_batch(&batch);
    assert_eq!(mgr.subscription_count(), 0);

    settle().await;
    transport.emit("links", event("x"));
    transport.emit("folders", event("y"));
    settle().await;
    assert!(received.lock().expect("poisoned").is_empty());
}

#[tokio::test]
async fn test_conditional_config_none_parks_slot_inert() {
    let transport = Arc::new(InMemoryTransport::new());
    let mgr = SubscriptionManager::new(transport.clone(), fast_policy());
    let (callback, received) = collector();

    let id = mgr.subscribe_when(|| None, callback, None);
    settle().await;

    assert_eq!(mgr.subscription_state(&id), Some(SubscriptionState::Paused));
    assert_eq!(transport.connect_count(), 0, "inert slot never subscribes");

    // Resuming an inert slot is a no-op, not a degenerate subscription.
    mgr.resume_subscription(&id).expect("resume failed");
    assert_eq!(mgr.subscription_state(&id), Some(SubscriptionState::Paused));

    transport.emit("links", event("x"));
    settle().await;
    assert!(received.lock().expect("poisoned").is_empty());

    mgr.unsubscribe(&id);
    assert_eq!(mgr.subscription_state(&id), None);
}

#[tokio::test]
async fn test_conditional_config_some_subscribes_normally() {
    let transport = Arc::new(InMemoryTransport::new());
    let mgr = SubscriptionManager::new(transport.clone(), fast_policy());
    let (callback, received) = collector();

    let id = mgr.subscribe_when(|| Some(SubscriptionConfig::all("links")), callback, None);
    settle().await;

    assert_eq!(mgr.subscription_state(&id), Some(SubscriptionState::Active));
    transport.emit("links", event("x"));
    settle().await;
    assert_eq!(received.lock().expect("poisoned").len(), 1);
}
