//! Integration tests for the notification dispatcher.

use maintwatch::core::{DispatchEvent, NotificationKind, Recipients};
use maintwatch::registry::ServerMessage;
use std::time::Duration;
use tokio::sync::mpsc;

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::{equipment_event, harness, harness_with_window};

#[tokio::test]
async fn disabled_recipient_gets_no_row_and_no_delivery_attempt() {
    // Arrange
    let h = harness();
    h.store
        .set_setting(7, NotificationKind::EquipmentFailure, false, true);
    h.store.add_subscription(7, "https://push.example/7");

    // Act
    let outcome = h
        .dispatcher
        .dispatch(equipment_event(3, Recipients::Explicit(vec![7])))
        .await
        .unwrap();

    // Assert: no row, no push attempt, counted as skipped rather than failed.
    assert!(h.store.notifications().is_empty());
    assert_eq!(h.relay.attempt_count(), 0);
    assert_eq!(outcome.skipped_disabled, 1);
    assert_eq!(outcome.notifications_created, 0);
    assert!(outcome.errors.is_empty());
}

#[tokio::test]
async fn absent_setting_row_means_opted_in() {
    let h = harness();
    h.store.add_subscription(7, "https://push.example/7");

    let outcome = h
        .dispatcher
        .dispatch(equipment_event(3, Recipients::Explicit(vec![7])))
        .await
        .unwrap();

    assert_eq!(outcome.notifications_created, 1);
    assert_eq!(outcome.push_sent, 1);
    assert_eq!(h.store.notifications_for(7).len(), 1);
}

#[tokio::test]
async fn live_recipient_gets_notification_then_unread_count() {
    let h = harness();
    let (tx, mut rx) = mpsc::unbounded_channel();
    h.registry.bind(7, h.registry.next_conn_id(), tx);

    let outcome = h
        .dispatcher
        .dispatch(equipment_event(3, Recipients::Explicit(vec![7])))
        .await
        .unwrap();
    assert_eq!(outcome.live_delivered, 1);

    // The new notification arrives first, the refreshed badge count second.
    match rx.try_recv().unwrap() {
        ServerMessage::NewNotification { notification } => {
            assert_eq!(notification.recipient_id, 7);
            assert_eq!(notification.kind, NotificationKind::EquipmentFailure);
            assert!(!notification.is_read);
        }
        other => panic!("expected new_notification first, got {other:?}"),
    }
    assert_eq!(rx.try_recv().unwrap(), ServerMessage::UnreadCount { count: 1 });
}

#[tokio::test]
async fn push_fires_even_when_live_delivery_succeeded() {
    // Dual delivery is intentional: the live channel and the push relay are
    // redundant, not exclusive.
    let h = harness();
    let (tx, mut rx) = mpsc::unbounded_channel();
    h.registry.bind(7, h.registry.next_conn_id(), tx);
    h.store.add_subscription(7, "https://push.example/7");

    let outcome = h
        .dispatcher
        .dispatch(equipment_event(3, Recipients::Explicit(vec![7])))
        .await
        .unwrap();

    assert_eq!(outcome.live_delivered, 1);
    assert_eq!(outcome.push_sent, 1);
    assert!(rx.try_recv().is_ok(), "live channel received the envelope");
    assert_eq!(h.relay.attempt_count(), 1);
}

#[tokio::test]
async fn push_disabled_setting_still_persists_the_row() {
    let h = harness();
    h.store
        .set_setting(7, NotificationKind::EquipmentFailure, true, false);
    h.store.add_subscription(7, "https://push.example/7");

    let outcome = h
        .dispatcher
        .dispatch(equipment_event(3, Recipients::Explicit(vec![7])))
        .await
        .unwrap();

    assert_eq!(outcome.notifications_created, 1);
    assert_eq!(outcome.push_sent, 0);
    assert_eq!(h.relay.attempt_count(), 0);
}

#[tokio::test]
async fn one_failing_recipient_does_not_block_the_others() {
    let h = harness();
    h.store.fail_inserts_for(2);

    let outcome = h
        .dispatcher
        .dispatch(equipment_event(3, Recipients::Explicit(vec![1, 2, 3])))
        .await
        .unwrap();

    assert_eq!(outcome.notifications_created, 2);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].contains("user 2"));
    assert_eq!(h.store.notifications_for(1).len(), 1);
    assert_eq!(h.store.notifications_for(3).len(), 1);
}

#[tokio::test]
async fn all_active_resolves_every_active_account() {
    let h = harness();
    h.store.add_active_user(1);
    h.store.add_active_user(2);
    h.store.add_active_user(3);

    let outcome = h
        .dispatcher
        .dispatch(equipment_event(3, Recipients::AllActive))
        .await
        .unwrap();

    assert_eq!(outcome.notifications_created, 3);
}

#[tokio::test]
async fn repeat_event_within_window_creates_exactly_one_row() {
    let h = harness();
    h.store.add_active_user(1);

    let first = h
        .dispatcher
        .dispatch(equipment_event(5, Recipients::AllActive))
        .await
        .unwrap();
    let second = h
        .dispatcher
        .dispatch(equipment_event(5, Recipients::AllActive))
        .await
        .unwrap();

    assert!(!first.suppressed);
    assert!(second.suppressed);
    assert_eq!(second.notifications_created, 0);
    assert_eq!(h.store.notifications_for(1).len(), 1);
}

#[tokio::test]
async fn window_is_scoped_per_related_id_not_per_kind() {
    let h = harness();
    h.store.add_active_user(1);

    h.dispatcher
        .dispatch(equipment_event(5, Recipients::AllActive))
        .await
        .unwrap();
    let other_equipment = h
        .dispatcher
        .dispatch(equipment_event(6, Recipients::AllActive))
        .await
        .unwrap();

    assert!(!other_equipment.suppressed);
    assert_eq!(h.store.notifications_for(1).len(), 2);
}

#[tokio::test]
async fn expired_window_allows_the_event_again() {
    let h = harness_with_window(Duration::from_millis(50));
    h.store.add_active_user(1);

    h.dispatcher
        .dispatch(equipment_event(5, Recipients::AllActive))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    let second = h
        .dispatcher
        .dispatch(equipment_event(5, Recipients::AllActive))
        .await
        .unwrap();

    assert!(!second.suppressed);
    assert_eq!(h.store.notifications_for(1).len(), 2);
}

#[tokio::test]
async fn events_without_a_subject_bypass_the_window() {
    let h = harness();
    let event = DispatchEvent {
        kind: NotificationKind::SystemAlert,
        title: "Storage almost full".to_string(),
        message: "Disk usage above 90%".to_string(),
        related_id: None,
        related_type: None,
        recipients: Recipients::Explicit(vec![1]),
    };

    h.dispatcher.dispatch(event.clone()).await.unwrap();
    let second = h.dispatcher.dispatch(event).await.unwrap();

    assert!(!second.suppressed);
    assert_eq!(h.store.notifications_for(1).len(), 2);
}

#[tokio::test]
async fn batch_processes_items_independently() {
    let h = harness();
    let bad = DispatchEvent {
        kind: NotificationKind::SystemAlert,
        title: "".to_string(),
        message: "missing title".to_string(),
        related_id: None,
        related_type: None,
        recipients: Recipients::Explicit(vec![1]),
    };

    let batch = h
        .dispatcher
        .dispatch_batch(vec![
            equipment_event(1, Recipients::Explicit(vec![1])),
            bad,
            equipment_event(2, Recipients::Explicit(vec![1])),
        ])
        .await;

    assert_eq!(batch.total, 3);
    assert_eq!(batch.success, 2);
    assert_eq!(batch.failed, 1);
    assert_eq!(batch.errors.len(), 1);
    assert!(batch.errors[0].starts_with("event 1:"));
    assert_eq!(h.store.notifications_for(1).len(), 2);
}
