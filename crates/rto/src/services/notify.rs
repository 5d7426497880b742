//! Notification and audit collaborators, fire-and-forget.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{RtoId, ShipmentId};
use domain::RtoEvent;

/// Kinds of RTO notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    RtoInitiated,
    RtoDeliveredToWarehouse,
    RtoQcCompleted,
}

/// Trait for dispatching seller notifications.
///
/// Delivery transports live outside this engine; implementations must
/// swallow their own failures, which is why these methods return `()`.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify_rto_initiated(&self, event: &RtoEvent);
    async fn notify_rto_delivered_to_warehouse(&self, event: &RtoEvent);
    async fn notify_rto_qc_completed(&self, event: &RtoEvent);
}

/// Dispatcher that only emits tracing events.
#[derive(Debug, Clone, Default)]
pub struct TracingNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for TracingNotificationDispatcher {
    async fn notify_rto_initiated(&self, event: &RtoEvent) {
        tracing::info!(rto_id = %event.id(), "notification: RTO initiated");
    }

    async fn notify_rto_delivered_to_warehouse(&self, event: &RtoEvent) {
        tracing::info!(rto_id = %event.id(), "notification: RTO delivered to warehouse");
    }

    async fn notify_rto_qc_completed(&self, event: &RtoEvent) {
        tracing::info!(rto_id = %event.id(), "notification: RTO QC completed");
    }
}

/// In-memory dispatcher recording every notification for assertions.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationDispatcher {
    sent: Arc<RwLock<Vec<(NotificationKind, RtoId)>>>,
}

impl InMemoryNotificationDispatcher {
    /// Creates a new recording dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many notifications of `kind` were sent.
    pub fn count_of(&self, kind: NotificationKind) -> usize {
        self.sent
            .read()
            .unwrap()
            .iter()
            .filter(|(sent_kind, _)| *sent_kind == kind)
            .count()
    }

    /// Returns the total number of notifications sent.
    pub fn total(&self) -> usize {
        self.sent.read().unwrap().len()
    }
}

#[async_trait]
impl NotificationDispatcher for InMemoryNotificationDispatcher {
    async fn notify_rto_initiated(&self, event: &RtoEvent) {
        self.sent
            .write()
            .unwrap()
            .push((NotificationKind::RtoInitiated, event.id()));
    }

    async fn notify_rto_delivered_to_warehouse(&self, event: &RtoEvent) {
        self.sent
            .write()
            .unwrap()
            .push((NotificationKind::RtoDeliveredToWarehouse, event.id()));
    }

    async fn notify_rto_qc_completed(&self, event: &RtoEvent) {
        self.sent
            .write()
            .unwrap()
            .push((NotificationKind::RtoQcCompleted, event.id()));
    }
}

/// One audit-trail entry.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: &'static str,
    pub rto_id: Option<RtoId>,
    pub shipment_id: Option<ShipmentId>,
    pub actor: Option<String>,
    pub detail: String,
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(action: &'static str, detail: impl Into<String>) -> Self {
        Self {
            action,
            rto_id: None,
            shipment_id: None,
            actor: None,
            detail: detail.into(),
            at: Utc::now(),
        }
    }

    pub fn rto(mut self, rto_id: RtoId) -> Self {
        self.rto_id = Some(rto_id);
        self
    }

    pub fn shipment(mut self, shipment_id: ShipmentId) -> Self {
        self.shipment_id = Some(shipment_id);
        self
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

/// Trait for recording audit entries, fire-and-forget.
#[async_trait]
pub trait AuditLogger: Send + Sync {
    async fn record(&self, entry: AuditEntry);
}

/// Audit logger that only emits tracing events.
#[derive(Debug, Clone, Default)]
pub struct TracingAuditLogger;

#[async_trait]
impl AuditLogger for TracingAuditLogger {
    async fn record(&self, entry: AuditEntry) {
        tracing::info!(
            action = entry.action,
            rto_id = ?entry.rto_id,
            detail = %entry.detail,
            "audit"
        );
    }
}

/// In-memory audit logger recording entries for assertions.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditLogger {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
}

impl InMemoryAuditLogger {
    /// Creates a new recording audit logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all recorded entries.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().unwrap().clone()
    }

    /// Returns how many entries carry the given action.
    pub fn count_of(&self, action: &str) -> usize {
        self.entries
            .read()
            .unwrap()
            .iter()
            .filter(|entry| entry.action == action)
            .count()
    }
}

#[async_trait]
impl AuditLogger for InMemoryAuditLogger {
    async fn record(&self, entry: AuditEntry) {
        self.entries.write().unwrap().push(entry);
    }
}
