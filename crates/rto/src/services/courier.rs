//! Courier adapter interface, registry, and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use domain::{RtoReason, Shipment};
use serde::Serialize;

use crate::error::{Result, RtoError};

/// Result of a successful reverse-shipment creation.
#[derive(Debug, Clone)]
pub struct ReverseShipmentResult {
    /// Tracking id issued by the courier for the return leg.
    pub reverse_awb: String,
}

/// One checkpoint in a shipment's tracking history.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingCheckpoint {
    pub at: DateTime<Utc>,
    pub location: String,
    pub remark: String,
}

/// Normalized tracking data, independent of the courier's wire format.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingInfo {
    pub status: String,
    pub current_location: Option<String>,
    pub tracking_history: Vec<TrackingCheckpoint>,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

/// Confirmation of a scheduled reverse pickup.
#[derive(Debug, Clone)]
pub struct PickupConfirmation {
    pub confirmation_id: String,
}

/// Optional pickup-scheduling capability.
///
/// Exposed through an explicit accessor instead of runtime probing, so
/// an absent capability is a typed `None`, never a missing method.
#[async_trait]
pub trait PickupScheduler: Send + Sync {
    async fn schedule_pickup(
        &self,
        reverse_awb: &str,
        date: NaiveDate,
        slot: &str,
    ) -> Result<PickupConfirmation>;
}

/// Per-carrier adapter consumed only through this interface.
#[async_trait]
pub trait CourierAdapter: Send + Sync + std::fmt::Debug {
    /// Canonical carrier identifier this adapter serves.
    fn carrier(&self) -> &str;

    /// Requests a reverse shipment for a failed delivery.
    async fn create_reverse_shipment(
        &self,
        shipment: &Shipment,
        reason: RtoReason,
    ) -> Result<ReverseShipmentResult>;

    /// Tracks a shipment leg by AWB.
    async fn track_shipment(&self, awb: &str) -> Result<TrackingInfo>;

    /// Cancels a reverse shipment before pickup.
    async fn cancel_reverse_shipment(&self, awb: &str, reason: &str) -> Result<()>;

    /// Returns the pickup-scheduling capability, when the carrier has one.
    fn pickup_scheduler(&self) -> Option<&dyn PickupScheduler> {
        None
    }
}

/// Adapter factory and carrier-name canonicalizer.
///
/// Injected into the coordinator instead of living as process-global
/// state, so tests can register deterministic fakes.
#[derive(Default)]
pub struct CourierRegistry {
    adapters: HashMap<String, Arc<dyn CourierAdapter>>,
    aliases: HashMap<String, String>,
}

impl CourierRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter under its canonical carrier name.
    pub fn register(&mut self, adapter: Arc<dyn CourierAdapter>) -> &mut Self {
        self.adapters
            .insert(adapter.carrier().to_lowercase(), adapter);
        self
    }

    /// Registers an alias for a canonical carrier name.
    pub fn register_alias(
        &mut self,
        alias: impl Into<String>,
        canonical: impl Into<String>,
    ) -> &mut Self {
        self.aliases
            .insert(alias.into().to_lowercase(), canonical.into().to_lowercase());
        self
    }

    /// Resolves a carrier identifier to its canonical name.
    pub fn canonical_name(&self, carrier: &str) -> String {
        let lowered = carrier.to_lowercase();
        self.aliases.get(&lowered).cloned().unwrap_or(lowered)
    }

    /// Resolves the adapter for a carrier identifier or alias.
    pub fn get_provider(&self, carrier: &str) -> Result<Arc<dyn CourierAdapter>> {
        let canonical = self.canonical_name(carrier);
        self.adapters
            .get(&canonical)
            .cloned()
            .ok_or_else(|| RtoError::UnsupportedCarrier(carrier.to_string()))
    }
}

#[derive(Debug, Default)]
struct InMemoryCourierState {
    reverse_shipments: HashMap<String, String>,
    cancelled: Vec<String>,
    next_id: u32,
    fail_on_create: bool,
    fail_on_cancel: bool,
}

/// In-memory pickup scheduler recording every accepted slot.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPickupScheduler {
    scheduled: Arc<RwLock<Vec<(String, NaiveDate, String)>>>,
}

impl InMemoryPickupScheduler {
    /// Returns the number of scheduled pickups.
    pub fn scheduled_count(&self) -> usize {
        self.scheduled.read().unwrap().len()
    }
}

#[async_trait]
impl PickupScheduler for InMemoryPickupScheduler {
    async fn schedule_pickup(
        &self,
        reverse_awb: &str,
        date: NaiveDate,
        slot: &str,
    ) -> Result<PickupConfirmation> {
        let mut scheduled = self.scheduled.write().unwrap();
        scheduled.push((reverse_awb.to_string(), date, slot.to_string()));
        Ok(PickupConfirmation {
            confirmation_id: format!("PICKUP-{:04}", scheduled.len()),
        })
    }
}

/// In-memory courier adapter for testing.
#[derive(Debug, Clone)]
pub struct InMemoryCourierAdapter {
    carrier: String,
    state: Arc<RwLock<InMemoryCourierState>>,
    pickup: Option<InMemoryPickupScheduler>,
}

impl InMemoryCourierAdapter {
    /// Creates an adapter without pickup scheduling.
    pub fn new(carrier: impl Into<String>) -> Self {
        Self {
            carrier: carrier.into(),
            state: Arc::new(RwLock::new(InMemoryCourierState::default())),
            pickup: None,
        }
    }

    /// Creates an adapter that also schedules pickups.
    pub fn with_pickup_scheduling(carrier: impl Into<String>) -> Self {
        Self {
            pickup: Some(InMemoryPickupScheduler::default()),
            ..Self::new(carrier)
        }
    }

    /// Configures the adapter to fail the next create call.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    /// Configures the adapter to fail the next cancel call.
    pub fn set_fail_on_cancel(&self, fail: bool) {
        self.state.write().unwrap().fail_on_cancel = fail;
    }

    /// Returns the number of live reverse shipments (cancelled removed).
    pub fn reverse_shipment_count(&self) -> usize {
        self.state.read().unwrap().reverse_shipments.len()
    }

    /// Returns how many cancellations were requested for this AWB.
    pub fn cancellations_for(&self, awb: &str) -> usize {
        self.state
            .read()
            .unwrap()
            .cancelled
            .iter()
            .filter(|cancelled| cancelled.as_str() == awb)
            .count()
    }

    /// Returns the pickup scheduler double, when configured.
    pub fn pickup_double(&self) -> Option<&InMemoryPickupScheduler> {
        self.pickup.as_ref()
    }
}

#[async_trait]
impl CourierAdapter for InMemoryCourierAdapter {
    fn carrier(&self) -> &str {
        &self.carrier
    }

    async fn create_reverse_shipment(
        &self,
        shipment: &Shipment,
        _reason: RtoReason,
    ) -> Result<ReverseShipmentResult> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_create {
            return Err(RtoError::CourierCreateFailed(
                "courier api rejected the request".to_string(),
            ));
        }

        state.next_id += 1;
        let reverse_awb = format!("RAWB-{:04}", state.next_id);
        state
            .reverse_shipments
            .insert(reverse_awb.clone(), shipment.awb.clone());

        Ok(ReverseShipmentResult { reverse_awb })
    }

    async fn track_shipment(&self, awb: &str) -> Result<TrackingInfo> {
        let state = self.state.read().unwrap();

        if !state.reverse_shipments.contains_key(awb) {
            return Err(RtoError::CourierTrackingFailed(format!(
                "unknown AWB {awb}"
            )));
        }

        Ok(TrackingInfo {
            status: "in_transit".to_string(),
            current_location: Some("Regional hub".to_string()),
            tracking_history: vec![TrackingCheckpoint {
                at: Utc::now(),
                location: "Origin facility".to_string(),
                remark: "Picked up".to_string(),
            }],
            estimated_delivery: None,
        })
    }

    async fn cancel_reverse_shipment(&self, awb: &str, _reason: &str) -> Result<()> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_cancel {
            return Err(RtoError::CourierCancelFailed(
                "courier api rejected the cancellation".to_string(),
            ));
        }

        state.reverse_shipments.remove(awb);
        state.cancelled.push(awb.to_string());
        Ok(())
    }

    fn pickup_scheduler(&self) -> Option<&dyn PickupScheduler> {
        self.pickup
            .as_ref()
            .map(|scheduler| scheduler as &dyn PickupScheduler)
    }
}
