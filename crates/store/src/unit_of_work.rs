//! Unit of work batching cross-entity writes behind one commit boundary.

use common::{NdrId, ShipmentId};
use domain::{NdrStatus, RtoEvent, ShipmentStatus};

/// A single staged write.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Persist a newly opened RTO event.
    InsertRtoEvent(RtoEvent),

    /// Overwrite an existing RTO event with its advanced state.
    UpdateRtoEvent(RtoEvent),

    /// Write a shipment status; only the RTO vocabulary is accepted.
    SetShipmentStatus {
        shipment_id: ShipmentId,
        status: ShipmentStatus,
    },

    /// Write an NDR status (consume the NDR on trigger).
    SetNdrStatus { ndr_id: NdrId, status: NdrStatus },
}

/// Staged writes committed atomically by [`RtoStore::commit`].
///
/// Either every staged write lands or none of them do; the trigger flow
/// relies on this to couple the RTO event, the shipment flip, and the
/// NDR consumption to a single outcome.
///
/// [`RtoStore::commit`]: crate::RtoStore::commit
#[derive(Debug, Default)]
pub struct UnitOfWork {
    ops: Vec<WriteOp>,
}

impl UnitOfWork {
    /// Creates an empty unit of work.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages an RTO event insertion.
    pub fn insert_rto_event(&mut self, event: RtoEvent) -> &mut Self {
        self.ops.push(WriteOp::InsertRtoEvent(event));
        self
    }

    /// Stages an RTO event update.
    pub fn update_rto_event(&mut self, event: RtoEvent) -> &mut Self {
        self.ops.push(WriteOp::UpdateRtoEvent(event));
        self
    }

    /// Stages a shipment status write.
    pub fn set_shipment_status(
        &mut self,
        shipment_id: ShipmentId,
        status: ShipmentStatus,
    ) -> &mut Self {
        self.ops
            .push(WriteOp::SetShipmentStatus { shipment_id, status });
        self
    }

    /// Stages an NDR status write.
    pub fn set_ndr_status(&mut self, ndr_id: NdrId, status: NdrStatus) -> &mut Self {
        self.ops.push(WriteOp::SetNdrStatus { ndr_id, status });
        self
    }

    /// Returns the staged writes.
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Consumes the unit of work, returning the staged writes.
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    /// Returns true if nothing has been staged.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Returns the number of staged writes.
    pub fn len(&self) -> usize {
        self.ops.len()
    }
}
