//! Reverse-leg tracking and pickup scheduling.

use std::sync::Arc;

use chrono::NaiveDate;
use common::RtoId;
use store::{RtoStore, UnitOfWork};

use crate::error::{Result, RtoError};
use crate::services::{
    CourierAdapter, CourierRegistry, PickupConfirmation, PickupScheduler, TrackingInfo,
};

/// Outcome of a pickup-scheduling request.
///
/// An adapter without the capability yields `NotSupported` rather than
/// an error; callers decide whether to surface it.
#[derive(Debug, Clone)]
pub enum PickupOutcome {
    Scheduled(PickupConfirmation),
    NotSupported { carrier: String },
}

/// Read-mostly operations against the courier's reverse leg.
pub struct ReverseShipmentService {
    store: Arc<dyn RtoStore>,
    couriers: Arc<CourierRegistry>,
}

impl ReverseShipmentService {
    /// Creates a new reverse-shipment service.
    pub fn new(store: Arc<dyn RtoStore>, couriers: Arc<CourierRegistry>) -> Self {
        Self { store, couriers }
    }

    /// Tracks a reverse shipment by its AWB.
    #[tracing::instrument(skip(self))]
    pub async fn track_reverse_shipment(&self, reverse_awb: &str) -> Result<TrackingInfo> {
        let event = self
            .store
            .rto_event_by_reverse_awb(reverse_awb)
            .await?
            .ok_or_else(|| RtoError::RtoNotFound(reverse_awb.to_string()))?;

        let shipment = self
            .store
            .shipment(event.shipment_id())
            .await?
            .ok_or(RtoError::ShipmentNotFound(event.shipment_id()))?;

        let adapter = self.couriers.get_provider(&shipment.carrier)?;
        adapter.track_shipment(reverse_awb).await
    }

    /// Schedules a reverse pickup through the adapter's optional
    /// capability; the accepted slot is recorded on the event.
    #[tracing::instrument(skip(self))]
    pub async fn schedule_reverse_pickup(
        &self,
        id: RtoId,
        date: NaiveDate,
        slot: &str,
    ) -> Result<PickupOutcome> {
        let mut event = self
            .store
            .rto_event(id)
            .await?
            .ok_or_else(|| RtoError::RtoNotFound(id.to_string()))?;

        let shipment = self
            .store
            .shipment(event.shipment_id())
            .await?
            .ok_or(RtoError::ShipmentNotFound(event.shipment_id()))?;

        let adapter = self.couriers.get_provider(&shipment.carrier)?;
        let Some(scheduler) = adapter.pickup_scheduler() else {
            return Ok(PickupOutcome::NotSupported {
                carrier: self.couriers.canonical_name(&shipment.carrier),
            });
        };

        let reverse_awb = event
            .reverse_awb()
            .ok_or_else(|| RtoError::InvalidState {
                message: "RTO has no reverse AWB to schedule a pickup for".to_string(),
            })?
            .to_string();

        let confirmation = scheduler.schedule_pickup(&reverse_awb, date, slot).await?;

        event.insert_metadata(
            "pickup",
            serde_json::json!({
                "date": date.to_string(),
                "slot": slot,
                "confirmation_id": confirmation.confirmation_id,
            }),
        );
        let mut uow = UnitOfWork::new();
        uow.update_rto_event(event);
        self.store.commit(uow).await?;

        Ok(PickupOutcome::Scheduled(confirmation))
    }
}
