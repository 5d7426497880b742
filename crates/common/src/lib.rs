//! Shared types for the RTO platform.
//!
//! Typed identifiers for every entity plus the `Money` value type used
//! for wallet charges and rate card amounts.

mod types;

pub use types::{CompanyId, Money, NdrId, OrderId, RtoId, ShipmentId, WarehouseId};
