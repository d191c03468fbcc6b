//! Periodic condition scanners.
//!
//! Each scanner inspects domain state through the external
//! [`ConditionSource`] and originates dispatch events when a condition is
//! met. Scanners run on the scheduler's cadences and can also be invoked
//! manually by an operator.

use crate::{
    core::{ConditionSource, DispatchEvent, NotificationKind, Recipients},
    dispatch::Dispatcher,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// Which scan an operator-triggered check runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualCheckKind {
    Equipment,
    Maintenance,
    ServiceOrders,
    All,
}

impl ManualCheckKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "equipment" => Some(ManualCheckKind::Equipment),
            "maintenance" => Some(ManualCheckKind::Maintenance),
            "service-orders" => Some(ManualCheckKind::ServiceOrders),
            "all" => Some(ManualCheckKind::All),
            _ => None,
        }
    }
}

/// A [`ConditionSource`] that never reports anything.
///
/// Used when the service runs without an integrated domain backend: the
/// realtime and push channels still serve clients, the scanners just find
/// nothing to report.
pub struct NoopConditionSource;

#[async_trait::async_trait]
impl ConditionSource for NoopConditionSource {
    async fn equipment_in_failure(&self) -> Result<Vec<crate::core::EquipmentAlarm>> {
        Ok(Vec::new())
    }

    async fn overdue_service_orders(&self) -> Result<Vec<crate::core::ServiceOrderAlarm>> {
        Ok(Vec::new())
    }
}

/// The fixed set of condition scanners.
pub struct ScannerSet {
    source: Arc<dyn ConditionSource>,
    dispatcher: Arc<Dispatcher>,
}

impl ScannerSet {
    pub fn new(source: Arc<dyn ConditionSource>, dispatcher: Arc<Dispatcher>) -> Self {
        Self { source, dispatcher }
    }

    /// Notifies every active account of equipment currently in failure.
    ///
    /// The anti-storm window in the dispatcher keeps a persistent failure
    /// from re-notifying on every tick.
    pub async fn scan_equipment(&self) -> Result<()> {
        let alarms = self.source.equipment_in_failure().await?;
        debug!(count = alarms.len(), "Equipment scan complete");
        for alarm in alarms {
            self.dispatcher
                .dispatch(DispatchEvent {
                    kind: NotificationKind::EquipmentFailure,
                    title: format!("Equipment failure: {}", alarm.name),
                    message: format!(
                        "{} has entered a failure state and needs attention.",
                        alarm.name
                    ),
                    related_id: Some(alarm.equipment_id),
                    related_type: Some("equipment".to_string()),
                    recipients: Recipients::AllActive,
                })
                .await?;
        }
        Ok(())
    }

    /// Maintenance-due checks are currently disabled. The job and this entry
    /// point stay wired so re-enabling is a change here, not a redesign.
    pub async fn scan_maintenance(&self) -> Result<()> {
        debug!("Maintenance-due scan is disabled; nothing to do");
        Ok(())
    }

    /// Notifies assignees of overdue service orders.
    pub async fn scan_service_orders(&self) -> Result<()> {
        let alarms = self.source.overdue_service_orders().await?;
        debug!(count = alarms.len(), "Service order scan complete");
        for alarm in alarms {
            self.dispatcher
                .dispatch(DispatchEvent {
                    kind: NotificationKind::ServiceOrderUpdate,
                    title: format!("Service order overdue: {}", alarm.title),
                    message: format!("Service order \"{}\" is past due.", alarm.title),
                    related_id: Some(alarm.order_id),
                    related_type: Some("service_order".to_string()),
                    recipients: Recipients::Explicit(alarm.assignee_ids),
                })
                .await?;
        }
        Ok(())
    }

    /// Runs one scan outside the schedule, for operator-triggered checks.
    pub async fn run_manual_check(&self, kind: ManualCheckKind) -> Result<()> {
        info!(?kind, "Running manual check");
        match kind {
            ManualCheckKind::Equipment => self.scan_equipment().await,
            ManualCheckKind::Maintenance => self.scan_maintenance().await,
            ManualCheckKind::ServiceOrders => self.scan_service_orders().await,
            ManualCheckKind::All => {
                self.scan_equipment().await?;
                self.scan_maintenance().await?;
                self.scan_service_orders().await
            }
        }
    }
}
