//! Storage layer for the RTO platform.
//!
//! Reads are repository lookups; every write goes through a
//! [`UnitOfWork`] applied atomically by [`RtoStore::commit`]. Unique
//! constraints carry stable names so the engine can translate storage
//! conflicts into domain errors without branching on driver internals.

mod error;
mod memory;
mod postgres;
mod store;
mod unit_of_work;

pub use error::{
    CHK_SHIPMENT_RTO_VOCABULARY, Result, StoreError, UQ_ACTIVE_RTO_PER_SHIPMENT, UQ_RTO_NDR_EVENT,
};
pub use memory::InMemoryRtoStore;
pub use postgres::PostgresRtoStore;
pub use store::{RtoFilter, RtoStore};
pub use unit_of_work::{UnitOfWork, WriteOp};
