//! Integration tests for the scanners, manual checks, and job isolation.

use maintwatch::core::NotificationKind;
use maintwatch::scanners::{ManualCheckKind, ScannerSet};
use maintwatch::scheduler::{JobHandler, Scheduler};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::fake_source::ScriptedConditionSource;
use helpers::harness;

#[tokio::test]
async fn manual_equipment_check_notifies_all_active_users() {
    let h = harness();
    h.store.add_active_user(1);
    h.store.add_active_user(2);
    let source = ScriptedConditionSource::new();
    source.add_failed_equipment(3, "Pump 3");
    let scanners = ScannerSet::new(Arc::new(source), h.dispatcher.clone());

    scanners
        .run_manual_check(ManualCheckKind::Equipment)
        .await
        .unwrap();

    for user in [1, 2] {
        let rows = h.store.notifications_for(user);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, NotificationKind::EquipmentFailure);
        assert_eq!(rows[0].related_id, Some(3));
    }
}

#[tokio::test]
async fn manual_service_order_check_notifies_assignees_only() {
    let h = harness();
    h.store.add_active_user(1);
    h.store.add_active_user(2);
    let source = ScriptedConditionSource::new();
    source.add_overdue_order(44, "Replace bearings", vec![2]);
    let scanners = ScannerSet::new(Arc::new(source), h.dispatcher.clone());

    scanners
        .run_manual_check(ManualCheckKind::ServiceOrders)
        .await
        .unwrap();

    assert!(h.store.notifications_for(1).is_empty());
    let rows = h.store.notifications_for(2);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, NotificationKind::ServiceOrderUpdate);
    assert_eq!(rows[0].related_id, Some(44));
}

#[tokio::test]
async fn maintenance_check_is_an_inert_placeholder() {
    let h = harness();
    h.store.add_active_user(1);
    let source = ScriptedConditionSource::new();
    source.add_failed_equipment(3, "Pump 3");
    let scanners = ScannerSet::new(Arc::new(source), h.dispatcher.clone());

    // The kind stays addressable, it just does nothing.
    scanners
        .run_manual_check(ManualCheckKind::Maintenance)
        .await
        .unwrap();

    assert!(h.store.notifications().is_empty());
}

#[tokio::test]
async fn manual_check_all_runs_every_scanner() {
    let h = harness();
    h.store.add_active_user(1);
    let source = ScriptedConditionSource::new();
    source.add_failed_equipment(3, "Pump 3");
    source.add_overdue_order(44, "Replace bearings", vec![1]);
    let scanners = ScannerSet::new(Arc::new(source), h.dispatcher.clone());

    scanners.run_manual_check(ManualCheckKind::All).await.unwrap();

    let kinds: Vec<NotificationKind> = h
        .store
        .notifications_for(1)
        .iter()
        .map(|n| n.kind)
        .collect();
    assert!(kinds.contains(&NotificationKind::EquipmentFailure));
    assert!(kinds.contains(&NotificationKind::ServiceOrderUpdate));
}

#[tokio::test]
async fn one_failing_job_does_not_stop_the_others() {
    tokio::time::pause();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = Scheduler::new(shutdown_rx);

    let healthy_runs = Arc::new(AtomicUsize::new(0));
    let healthy_clone = healthy_runs.clone();
    let healthy: JobHandler = Arc::new(move || {
        let runs = healthy_clone.clone();
        Box::pin(async move {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    });
    let failing: JobHandler =
        Arc::new(|| Box::pin(async { anyhow::bail!("store unavailable") }));

    scheduler.schedule_job("failing-scan", Duration::from_secs(1), failing);
    scheduler.schedule_job("healthy-scan", Duration::from_secs(1), healthy);

    tokio::time::sleep(Duration::from_millis(10)).await;
    tokio::time::advance(Duration::from_secs(3)).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(healthy_runs.load(Ordering::SeqCst) >= 2);
    assert_eq!(
        scheduler.job_names(),
        vec!["failing-scan", "healthy-scan"],
        "a failing job is never deregistered"
    );
}

#[tokio::test]
async fn scanner_store_failure_is_isolated_to_the_tick() {
    // A scanner whose dispatch hits a store failure reports the error to
    // its caller; nothing panics and the next invocation works again.
    let h = harness();
    h.store.add_active_user(1);
    h.store.fail_inserts_for(1);
    let source = ScriptedConditionSource::new();
    source.add_failed_equipment(3, "Pump 3");
    let scanners = ScannerSet::new(Arc::new(source), h.dispatcher.clone());

    // The per-recipient failure is aggregated, not thrown.
    scanners
        .run_manual_check(ManualCheckKind::Equipment)
        .await
        .unwrap();
    assert!(h.store.notifications_for(1).is_empty());
}
