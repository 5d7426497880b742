use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{CompanyId, NdrId, OrderId, RtoId, ShipmentId};
use domain::{NdrEvent, Order, RtoEvent, Shipment};
use tokio::sync::RwLock;

use crate::error::{Result, StoreError, UQ_ACTIVE_RTO_PER_SHIPMENT, UQ_RTO_NDR_EVENT};
use crate::store::{RtoFilter, RtoStore, ensure_rto_writable};
use crate::unit_of_work::{UnitOfWork, WriteOp};

#[derive(Default)]
struct State {
    shipments: HashMap<ShipmentId, Shipment>,
    orders: HashMap<OrderId, Order>,
    ndr_events: HashMap<NdrId, NdrEvent>,
    rto_events: HashMap<RtoId, RtoEvent>,
}

/// In-memory RTO store for tests and local development.
///
/// All collections live behind a single lock, so a commit is atomic with
/// respect to every reader: the whole unit is validated first and applied
/// only if every staged write is legal.
#[derive(Clone, Default)]
pub struct InMemoryRtoStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryRtoStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a shipment.
    pub async fn insert_shipment(&self, shipment: Shipment) {
        self.state
            .write()
            .await
            .shipments
            .insert(shipment.id, shipment);
    }

    /// Seeds an order.
    pub async fn insert_order(&self, order: Order) {
        self.state.write().await.orders.insert(order.id, order);
    }

    /// Seeds an NDR event.
    pub async fn insert_ndr_event(&self, ndr: NdrEvent) {
        self.state.write().await.ndr_events.insert(ndr.id, ndr);
    }

    /// Returns the total number of stored RTO events.
    pub async fn rto_event_count(&self) -> usize {
        self.state.read().await.rto_events.len()
    }
}

impl State {
    fn validate(&self, ops: &[WriteOp]) -> Result<()> {
        // Inserts staged earlier in the same unit count against later ones.
        let mut staged_active_shipments: Vec<ShipmentId> = Vec::new();
        let mut staged_ndr_claims: Vec<NdrId> = Vec::new();

        for op in ops {
            match op {
                WriteOp::InsertRtoEvent(event) => {
                    if event.is_active() {
                        let conflict = self
                            .rto_events
                            .values()
                            .any(|existing| {
                                existing.shipment_id() == event.shipment_id()
                                    && existing.is_active()
                            })
                            || staged_active_shipments.contains(&event.shipment_id());
                        if conflict {
                            return Err(StoreError::UniqueViolation {
                                constraint: UQ_ACTIVE_RTO_PER_SHIPMENT.to_string(),
                            });
                        }
                        staged_active_shipments.push(event.shipment_id());
                    }

                    if let Some(ndr_id) = event.ndr_event_id() {
                        let claimed = self
                            .rto_events
                            .values()
                            .any(|existing| existing.ndr_event_id() == Some(ndr_id))
                            || staged_ndr_claims.contains(&ndr_id);
                        if claimed {
                            return Err(StoreError::UniqueViolation {
                                constraint: UQ_RTO_NDR_EVENT.to_string(),
                            });
                        }
                        staged_ndr_claims.push(ndr_id);
                    }
                }
                WriteOp::UpdateRtoEvent(event) => {
                    if !self.rto_events.contains_key(&event.id()) {
                        return Err(StoreError::NotFound {
                            entity: "RtoEvent",
                            id: event.id().to_string(),
                        });
                    }
                }
                WriteOp::SetShipmentStatus { shipment_id, status } => {
                    ensure_rto_writable(*status)?;
                    if !self.shipments.contains_key(shipment_id) {
                        return Err(StoreError::NotFound {
                            entity: "Shipment",
                            id: shipment_id.to_string(),
                        });
                    }
                }
                WriteOp::SetNdrStatus { ndr_id, .. } => {
                    if !self.ndr_events.contains_key(ndr_id) {
                        return Err(StoreError::NotFound {
                            entity: "NdrEvent",
                            id: ndr_id.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, ops: Vec<WriteOp>) {
        for op in ops {
            match op {
                WriteOp::InsertRtoEvent(event) | WriteOp::UpdateRtoEvent(event) => {
                    self.rto_events.insert(event.id(), event);
                }
                WriteOp::SetShipmentStatus { shipment_id, status } => {
                    if let Some(shipment) = self.shipments.get_mut(&shipment_id) {
                        shipment.status = status;
                        shipment.updated_at = Utc::now();
                    }
                }
                WriteOp::SetNdrStatus { ndr_id, status } => {
                    if let Some(ndr) = self.ndr_events.get_mut(&ndr_id) {
                        ndr.status = status;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl RtoStore for InMemoryRtoStore {
    async fn shipment(&self, id: ShipmentId) -> Result<Option<Shipment>> {
        Ok(self.state.read().await.shipments.get(&id).cloned())
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn ndr_event(&self, id: NdrId) -> Result<Option<NdrEvent>> {
        Ok(self.state.read().await.ndr_events.get(&id).cloned())
    }

    async fn rto_event(&self, id: RtoId) -> Result<Option<RtoEvent>> {
        Ok(self.state.read().await.rto_events.get(&id).cloned())
    }

    async fn rto_event_by_reverse_awb(&self, reverse_awb: &str) -> Result<Option<RtoEvent>> {
        Ok(self
            .state
            .read()
            .await
            .rto_events
            .values()
            .find(|event| event.reverse_awb() == Some(reverse_awb))
            .cloned())
    }

    async fn active_rto_for_shipment(&self, shipment_id: ShipmentId) -> Result<Option<RtoEvent>> {
        Ok(self
            .state
            .read()
            .await
            .rto_events
            .values()
            .find(|event| event.shipment_id() == shipment_id && event.is_active())
            .cloned())
    }

    async fn rto_event_for_ndr(&self, ndr_id: NdrId) -> Result<Option<RtoEvent>> {
        Ok(self
            .state
            .read()
            .await
            .rto_events
            .values()
            .find(|event| event.ndr_event_id() == Some(ndr_id))
            .cloned())
    }

    async fn rto_events_for_company(
        &self,
        company_id: CompanyId,
        filter: &RtoFilter,
    ) -> Result<Vec<RtoEvent>> {
        let state = self.state.read().await;
        let mut events: Vec<_> = state
            .rto_events
            .values()
            .filter(|event| event.company_id() == company_id && filter.matches(event))
            .cloned()
            .collect();
        events.sort_by_key(|event| event.created_at());
        Ok(events)
    }

    async fn commit(&self, uow: UnitOfWork) -> Result<()> {
        let mut state = self.state.write().await;
        let ops = uow.into_ops();
        state.validate(&ops)?;
        state.apply(ops);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, WarehouseId};
    use domain::{NdrStatus, NewRto, ReturnStatus, RtoReason, ShipmentStatus, TriggerType};

    fn test_shipment() -> Shipment {
        Shipment {
            id: ShipmentId::new(),
            order_id: OrderId::new(),
            company_id: CompanyId::new(),
            warehouse_id: WarehouseId::new(),
            carrier: "bluedart".to_string(),
            awb: "AWB-100".to_string(),
            weight_grams: 750,
            zone: "zone-b".to_string(),
            status: ShipmentStatus::Ndr,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn open_event_for(shipment: &Shipment, ndr_event_id: Option<NdrId>) -> RtoEvent {
        let mut event = RtoEvent::open(NewRto {
            shipment_id: shipment.id,
            order_id: shipment.order_id,
            company_id: shipment.company_id,
            warehouse_id: shipment.warehouse_id,
            reason: RtoReason::NdrUnresolved,
            trigger_type: TriggerType::Auto,
            ndr_event_id,
            charge: Money::from_cents(5000),
        });
        event.assign_reverse_awb(format!("R{}", shipment.awb));
        event
    }

    #[tokio::test]
    async fn test_commit_applies_all_writes() {
        let store = InMemoryRtoStore::new();
        let shipment = test_shipment();
        let ndr = NdrEvent {
            id: NdrId::new(),
            shipment_id: shipment.id,
            attempt: 1,
            courier_remark: "address not found".to_string(),
            status: NdrStatus::Pending,
            created_at: Utc::now(),
        };
        store.insert_shipment(shipment.clone()).await;
        store.insert_ndr_event(ndr.clone()).await;

        let event = open_event_for(&shipment, Some(ndr.id));
        let event_id = event.id();

        let mut uow = UnitOfWork::new();
        uow.insert_rto_event(event)
            .set_shipment_status(shipment.id, ShipmentStatus::RtoInitiated)
            .set_ndr_status(ndr.id, NdrStatus::RtoTriggered);
        store.commit(uow).await.unwrap();

        let stored = store.rto_event(event_id).await.unwrap().unwrap();
        assert_eq!(stored.return_status(), ReturnStatus::Initiated);
        assert_eq!(
            store.shipment(shipment.id).await.unwrap().unwrap().status,
            ShipmentStatus::RtoInitiated
        );
        assert_eq!(
            store.ndr_event(ndr.id).await.unwrap().unwrap().status,
            NdrStatus::RtoTriggered
        );
    }

    #[tokio::test]
    async fn test_second_active_rto_for_shipment_is_rejected() {
        let store = InMemoryRtoStore::new();
        let shipment = test_shipment();
        store.insert_shipment(shipment.clone()).await;

        let mut uow = UnitOfWork::new();
        uow.insert_rto_event(open_event_for(&shipment, None));
        store.commit(uow).await.unwrap();

        let mut second = UnitOfWork::new();
        second.insert_rto_event(open_event_for(&shipment, None));
        let err = store.commit(second).await.unwrap_err();

        assert!(err.is_unique_violation(UQ_ACTIVE_RTO_PER_SHIPMENT));
        assert_eq!(store.rto_event_count().await, 1);
    }

    #[tokio::test]
    async fn test_terminal_rto_frees_the_shipment_slot() {
        let store = InMemoryRtoStore::new();
        let shipment = test_shipment();
        store.insert_shipment(shipment.clone()).await;

        let mut cancelled = open_event_for(&shipment, None);
        cancelled
            .transition_to(ReturnStatus::Cancelled, None, None)
            .unwrap();
        let mut uow = UnitOfWork::new();
        uow.insert_rto_event(cancelled);
        store.commit(uow).await.unwrap();

        // The cancelled event no longer occupies the active slot.
        let mut second = UnitOfWork::new();
        second.insert_rto_event(open_event_for(&shipment, None));
        store.commit(second).await.unwrap();

        assert_eq!(store.rto_event_count().await, 2);
        assert!(
            store
                .active_rto_for_shipment(shipment.id)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_duplicate_ndr_claim_is_rejected() {
        let store = InMemoryRtoStore::new();
        let first_shipment = test_shipment();
        let second_shipment = test_shipment();
        store.insert_shipment(first_shipment.clone()).await;
        store.insert_shipment(second_shipment.clone()).await;

        let ndr_id = NdrId::new();

        let mut uow = UnitOfWork::new();
        uow.insert_rto_event(open_event_for(&first_shipment, Some(ndr_id)));
        store.commit(uow).await.unwrap();

        let mut second = UnitOfWork::new();
        second.insert_rto_event(open_event_for(&second_shipment, Some(ndr_id)));
        let err = store.commit(second).await.unwrap_err();

        assert!(err.is_unique_violation(UQ_RTO_NDR_EVENT));
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_no_partial_state() {
        let store = InMemoryRtoStore::new();
        let shipment = test_shipment();
        store.insert_shipment(shipment.clone()).await;

        // NDR write targets a record that does not exist, so the whole
        // unit must be rejected, including the event insert before it.
        let mut uow = UnitOfWork::new();
        uow.insert_rto_event(open_event_for(&shipment, None))
            .set_shipment_status(shipment.id, ShipmentStatus::RtoInitiated)
            .set_ndr_status(NdrId::new(), NdrStatus::RtoTriggered);

        let err = store.commit(uow).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "NdrEvent", .. }));

        assert_eq!(store.rto_event_count().await, 0);
        assert_eq!(
            store.shipment(shipment.id).await.unwrap().unwrap().status,
            ShipmentStatus::Ndr
        );
    }

    #[tokio::test]
    async fn test_shipment_write_outside_rto_vocabulary_is_rejected() {
        let store = InMemoryRtoStore::new();
        let shipment = test_shipment();
        store.insert_shipment(shipment.clone()).await;

        let mut uow = UnitOfWork::new();
        uow.set_shipment_status(shipment.id, ShipmentStatus::Delivered);

        let err = store.commit(uow).await.unwrap_err();
        assert!(matches!(err, StoreError::CheckViolation { .. }));
        assert_eq!(
            store.shipment(shipment.id).await.unwrap().unwrap().status,
            ShipmentStatus::Ndr
        );
    }

    #[tokio::test]
    async fn test_lookup_by_reverse_awb_and_ndr() {
        let store = InMemoryRtoStore::new();
        let shipment = test_shipment();
        store.insert_shipment(shipment.clone()).await;

        let ndr_id = NdrId::new();
        let event = open_event_for(&shipment, Some(ndr_id));
        let awb = event.reverse_awb().unwrap().to_string();

        let mut uow = UnitOfWork::new();
        uow.insert_rto_event(event);
        store.commit(uow).await.unwrap();

        assert!(
            store
                .rto_event_by_reverse_awb(&awb)
                .await
                .unwrap()
                .is_some()
        );
        assert!(store.rto_event_for_ndr(ndr_id).await.unwrap().is_some());
        assert!(
            store
                .rto_event_by_reverse_awb("missing")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_company_listing_applies_filter() {
        let store = InMemoryRtoStore::new();
        let shipment_a = test_shipment();
        let mut shipment_b = test_shipment();
        shipment_b.company_id = shipment_a.company_id;
        store.insert_shipment(shipment_a.clone()).await;
        store.insert_shipment(shipment_b.clone()).await;

        let event_a = open_event_for(&shipment_a, None);
        let mut event_b = RtoEvent::open(NewRto {
            shipment_id: shipment_b.id,
            order_id: shipment_b.order_id,
            company_id: shipment_b.company_id,
            warehouse_id: shipment_b.warehouse_id,
            reason: RtoReason::AddressIssue,
            trigger_type: TriggerType::Manual,
            ndr_event_id: None,
            charge: Money::from_cents(3000),
        });
        event_b.assign_reverse_awb("RAWB-B");

        let mut uow = UnitOfWork::new();
        uow.insert_rto_event(event_a).insert_rto_event(event_b);
        store.commit(uow).await.unwrap();

        let all = store
            .rto_events_for_company(shipment_a.company_id, &RtoFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let address_only = store
            .rto_events_for_company(
                shipment_a.company_id,
                &RtoFilter {
                    reason: Some(RtoReason::AddressIssue),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(address_only.len(), 1);

        let other_company = store
            .rto_events_for_company(CompanyId::new(), &RtoFilter::default())
            .await
            .unwrap();
        assert!(other_company.is_empty());
    }
}
