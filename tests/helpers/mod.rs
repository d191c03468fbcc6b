#![allow(dead_code)]
pub mod fake_push;

use fake_push::FakePushRelay;
use maintwatch::{
    config::Config,
    core::{DispatchEvent, NotificationKind, Recipients},
    deduplication::Deduplicator,
    dispatch::Dispatcher,
    push::PushDelivery,
    registry::ConnectionRegistry,
    storage::MemoryStore,
};
use std::sync::Arc;
use std::time::Duration;

/// The delivery subsystem wired over in-memory collaborators.
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub relay: FakePushRelay,
    pub dispatcher: Arc<Dispatcher>,
}

/// Builds a harness with the default one-hour anti-storm window.
pub fn harness() -> TestHarness {
    harness_with_window(Duration::from_secs(3600))
}

pub fn harness_with_window(window: Duration) -> TestHarness {
    let store = Arc::new(MemoryStore::new());
    let registry = Arc::new(ConnectionRegistry::new());
    let relay = FakePushRelay::new();
    let push = Arc::new(PushDelivery::new(
        store.clone(),
        Arc::new(relay.clone()),
        Config::default().push,
    ));
    let deduplicator = Arc::new(Deduplicator::new(window, 1_000));
    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        registry.clone(),
        push,
        deduplicator,
    ));
    TestHarness {
        store,
        registry,
        relay,
        dispatcher,
    }
}

/// A well-formed equipment failure event for the given recipients.
pub fn equipment_event(related_id: i64, recipients: Recipients) -> DispatchEvent {
    DispatchEvent {
        kind: NotificationKind::EquipmentFailure,
        title: "Equipment failure: Pump 3".to_string(),
        message: "Pump 3 has entered a failure state and needs attention.".to_string(),
        related_id: Some(related_id),
        related_type: Some("equipment".to_string()),
        recipients,
    }
}
