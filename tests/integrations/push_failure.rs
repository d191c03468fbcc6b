//! Integration tests for push delivery failure handling.

use maintwatch::config::Config;
use maintwatch::core::{Notification, NotificationKind};
use maintwatch::push::{PushDelivery, PushReport, Urgency};
use maintwatch::storage::MemoryStore;
use std::sync::Arc;

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::fake_push::{FakePushRelay, RelayScript};

fn delivery(store: Arc<MemoryStore>, relay: FakePushRelay) -> PushDelivery {
    PushDelivery::new(store, Arc::new(relay), Config::default().push)
}

fn test_notification(recipient_id: i64) -> Notification {
    Notification {
        id: 1,
        recipient_id,
        kind: NotificationKind::EquipmentFailure,
        title: "Equipment failure: Pump 3".to_string(),
        message: "Pump 3 has entered a failure state.".to_string(),
        related_id: Some(3),
        related_type: Some("equipment".to_string()),
        is_read: false,
        created_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn gone_endpoint_deactivates_only_that_subscription() {
    // Arrange: one dead endpoint, one healthy sibling.
    let store = Arc::new(MemoryStore::new());
    let dead = store.add_subscription(7, "https://push.example/dead");
    let healthy = store.add_subscription(7, "https://push.example/healthy");
    let relay = FakePushRelay::new();
    relay.script("https://push.example/dead", RelayScript::Gone);

    // Act
    let report = delivery(store.clone(), relay.clone())
        .send(7, &test_notification(7))
        .await;

    // Assert: no exception surfaced, the dead row is deactivated, the
    // sibling is untouched and was still attempted.
    assert_eq!(report, PushReport { sent: 1, failed: 1 });
    assert!(!store.subscription(dead).unwrap().active);
    assert!(store.subscription(healthy).unwrap().active);
    assert_eq!(relay.attempt_count(), 2);
}

#[tokio::test]
async fn deactivated_subscription_is_never_targeted_again() {
    let store = Arc::new(MemoryStore::new());
    store.add_subscription(7, "https://push.example/dead");
    let healthy = store.add_subscription(7, "https://push.example/healthy");
    let relay = FakePushRelay::new();
    relay.script("https://push.example/dead", RelayScript::Gone);
    let delivery = delivery(store.clone(), relay.clone());

    delivery.send(7, &test_notification(7)).await;
    let second = delivery.send(7, &test_notification(7)).await;

    // Second send only reaches the surviving subscription.
    assert_eq!(second, PushReport { sent: 1, failed: 0 });
    assert_eq!(relay.attempts().iter().filter(|&&id| id == healthy).count(), 2);
    assert_eq!(relay.attempt_count(), 3);
}

#[tokio::test]
async fn transient_failure_keeps_the_subscription() {
    let store = Arc::new(MemoryStore::new());
    let flaky = store.add_subscription(7, "https://push.example/flaky");
    let relay = FakePushRelay::new();
    relay.script("https://push.example/flaky", RelayScript::Fail);

    let report = delivery(store.clone(), relay)
        .send(7, &test_notification(7))
        .await;

    // Logged and counted, no deactivation, no retry within this dispatch.
    assert_eq!(report, PushReport { sent: 0, failed: 1 });
    assert!(store.subscription(flaky).unwrap().active);
}

#[tokio::test]
async fn system_alerts_are_delivered_with_high_urgency() {
    let store = Arc::new(MemoryStore::new());
    store.add_subscription(7, "https://push.example/7");
    let relay = FakePushRelay::new();

    let mut notification = test_notification(7);
    notification.kind = NotificationKind::SystemAlert;
    delivery(store, relay.clone()).send(7, &notification).await;

    let delivered = relay.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].2, Urgency::High);
}

#[tokio::test]
async fn user_without_subscriptions_reports_nothing() {
    let store = Arc::new(MemoryStore::new());
    let relay = FakePushRelay::new();

    let report = delivery(store, relay.clone())
        .send(7, &test_notification(7))
        .await;

    assert_eq!(report, PushReport::default());
    assert_eq!(relay.attempt_count(), 0);
}
