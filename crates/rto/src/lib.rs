//! Return-to-origin lifecycle engine.
//!
//! One concrete workflow, not a generic saga framework:
//! - [`RtoTriggerCoordinator`] runs the precondition chain and the atomic
//!   trigger unit (wallet charge, reverse shipment, event creation,
//!   shipment flip, NDR consumption), compensating external steps in
//!   reverse order when a later step fails.
//! - [`RtoStateMachine`] advances events along the fixed transition
//!   graph, recording QC and firing notifications at the edges.
//! - [`RestockExecutor`] performs the terminal inventory adjustment.
//! - [`ReverseShipmentService`] tracks the reverse leg and schedules
//!   pickups through the adapter's optional capability.
//!
//! All collaborators are injected traits with in-memory doubles under
//! [`services`].

pub mod coordinator;
pub mod error;
pub mod lifecycle;
pub mod restock;
pub mod reverse;
pub mod services;

pub use coordinator::{RtoTriggerCoordinator, TriggerRequest};
pub use error::{ErrorBody, Result, RtoError};
pub use lifecycle::{RtoStateMachine, TransitionContext};
pub use restock::RestockExecutor;
pub use reverse::{PickupOutcome, ReverseShipmentService};
