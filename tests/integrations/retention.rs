//! Integration tests for the retention sweeper.

use chrono::{Duration as ChronoDuration, Utc};
use maintwatch::config::RetentionConfig;
use maintwatch::core::NotificationKind;
use maintwatch::storage::MemoryStore;
use maintwatch::sweeper::RetentionSweeper;
use std::sync::Arc;

#[path = "../helpers/mod.rs"]
mod helpers;

fn days_ago(days: i64) -> chrono::DateTime<Utc> {
    Utc::now() - ChronoDuration::days(days)
}

fn config() -> RetentionConfig {
    RetentionConfig {
        read_max_days: 30,
        unread_max_days: 90,
        subscription_max_days: 60,
    }
}

#[tokio::test]
async fn sweep_removes_exactly_the_rows_past_their_threshold() {
    // Arrange: read rows age out at 30 days, unread ones at 90.
    let store = Arc::new(MemoryStore::new());
    let kind = NotificationKind::EquipmentFailure;
    let keep_read = store.seed_notification(7, kind, true, days_ago(20));
    store.seed_notification(7, kind, true, days_ago(35));
    let keep_unread = store.seed_notification(7, kind, false, days_ago(50));
    store.seed_notification(7, kind, false, days_ago(95));

    // Act
    let removed = RetentionSweeper::new(store.clone(), config())
        .sweep()
        .await
        .unwrap();

    // Assert
    assert_eq!(removed, 2);
    let remaining: Vec<i64> = store.notifications().iter().map(|n| n.id).collect();
    assert_eq!(remaining, vec![keep_read, keep_unread]);
}

#[tokio::test]
async fn sweep_prunes_stale_subscriptions() {
    let store = Arc::new(MemoryStore::new());
    let stale = store.add_subscription_updated_at(7, "https://push.example/old", days_ago(70));
    let fresh = store.add_subscription_updated_at(7, "https://push.example/new", days_ago(10));

    let removed = RetentionSweeper::new(store.clone(), config())
        .sweep()
        .await
        .unwrap();

    assert_eq!(removed, 1);
    assert!(store.subscription(stale).is_none());
    assert!(store.subscription(fresh).is_some());
}

#[tokio::test]
async fn sweep_reports_zero_when_nothing_expired() {
    let store = Arc::new(MemoryStore::new());
    store.seed_notification(7, NotificationKind::SystemAlert, true, days_ago(5));
    store.add_subscription(7, "https://push.example/7");

    let removed = RetentionSweeper::new(store.clone(), config())
        .sweep()
        .await
        .unwrap();

    assert_eq!(removed, 0);
    assert_eq!(store.notifications().len(), 1);
    assert_eq!(store.subscriptions().len(), 1);
}
