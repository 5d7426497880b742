//! Domain layer for the RTO platform.
//!
//! This crate provides the entities the engine works over:
//! - The `RtoEvent` aggregate with its `ReturnStatus` state machine
//! - The partially-owned `Shipment` and its RTO status vocabulary
//! - The `Order` and `NdrEvent` entities read during restock and trigger

pub mod ndr;
pub mod order;
pub mod rto;
pub mod shipment;

pub use ndr::{NdrEvent, NdrStatus};
pub use order::{Order, OrderItem};
pub use rto::{
    NewRto, QcInput, QcResult, ReturnStatus, RtoEvent, RtoEventError, RtoReason, StatusChange,
    TriggerType,
};
pub use shipment::{Shipment, ShipmentStatus};
