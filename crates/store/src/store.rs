use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CompanyId, NdrId, OrderId, RtoId, ShipmentId, WarehouseId};
use domain::{NdrEvent, Order, RtoEvent, RtoReason, Shipment, ShipmentStatus};

use crate::error::{CHK_SHIPMENT_RTO_VOCABULARY, Result, StoreError};
use crate::unit_of_work::UnitOfWork;

/// Filter for listing historical RTO events.
#[derive(Debug, Clone, Default)]
pub struct RtoFilter {
    /// Only events created at or after this instant.
    pub from: Option<DateTime<Utc>>,
    /// Only events created at or before this instant.
    pub to: Option<DateTime<Utc>>,
    /// Only events for this warehouse.
    pub warehouse_id: Option<WarehouseId>,
    /// Only events with this trigger reason.
    pub reason: Option<RtoReason>,
}

impl RtoFilter {
    /// Returns true if the event passes every set filter.
    pub fn matches(&self, event: &RtoEvent) -> bool {
        if let Some(from) = self.from
            && event.created_at() < from
        {
            return false;
        }
        if let Some(to) = self.to
            && event.created_at() > to
        {
            return false;
        }
        if let Some(warehouse_id) = self.warehouse_id
            && event.warehouse_id() != warehouse_id
        {
            return false;
        }
        if let Some(reason) = self.reason
            && event.rto_reason() != reason
        {
            return false;
        }
        true
    }
}

/// Core trait for RTO store implementations.
///
/// Reads are plain repository lookups; all writes go through
/// [`RtoStore::commit`], which applies a [`UnitOfWork`] atomically.
/// Implementations must be thread-safe (Send + Sync) and must guarantee
/// that a concurrent reader never observes a partially applied unit.
#[async_trait]
pub trait RtoStore: Send + Sync {
    /// Looks up a shipment by id.
    async fn shipment(&self, id: ShipmentId) -> Result<Option<Shipment>>;

    /// Looks up an order by id.
    async fn order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Looks up an NDR event by id.
    async fn ndr_event(&self, id: NdrId) -> Result<Option<NdrEvent>>;

    /// Looks up an RTO event by id.
    async fn rto_event(&self, id: RtoId) -> Result<Option<RtoEvent>>;

    /// Looks up an RTO event by its reverse-leg tracking id.
    async fn rto_event_by_reverse_awb(&self, reverse_awb: &str) -> Result<Option<RtoEvent>>;

    /// Returns the active (non-terminal) RTO event for a shipment, if any.
    async fn active_rto_for_shipment(&self, shipment_id: ShipmentId) -> Result<Option<RtoEvent>>;

    /// Returns the RTO event that claimed an NDR, if any.
    async fn rto_event_for_ndr(&self, ndr_id: NdrId) -> Result<Option<RtoEvent>>;

    /// Lists a company's RTO events matching the filter, oldest first.
    async fn rto_events_for_company(
        &self,
        company_id: CompanyId,
        filter: &RtoFilter,
    ) -> Result<Vec<RtoEvent>>;

    /// Applies a unit of work atomically.
    ///
    /// Fails with a named [`StoreError::UniqueViolation`] when the
    /// one-active-RTO-per-shipment or one-RTO-per-NDR constraint would be
    /// broken, leaving the store untouched.
    async fn commit(&self, uow: UnitOfWork) -> Result<()>;
}

/// Rejects shipment status writes outside the RTO vocabulary.
///
/// Shared by every store implementation so the guard cannot drift.
pub(crate) fn ensure_rto_writable(status: ShipmentStatus) -> Result<()> {
    if status.is_rto_writable() {
        Ok(())
    } else {
        Err(StoreError::CheckViolation {
            constraint: CHK_SHIPMENT_RTO_VOCABULARY,
        })
    }
}
