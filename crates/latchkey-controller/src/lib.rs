//! Access cycle coordination for the Latchkey door controller.
//!
//! The [`RequestCoordinator`] fuses every credential source into a single
//! outstanding request: it picks the first ready credential by priority,
//! silences the other readers, publishes the request, waits a bounded time
//! for a fresh decision and drives the relay only on `allow`.
//!
//! Timeouts, publish failures, relay failures and unknown statuses all
//! resolve to a deny; the coordinator always comes back to
//! [`CoordinatorState::Armed`].

pub mod coordinator;
pub mod error;
pub mod outcome;
pub mod state_machine;

pub use coordinator::{CoordinatorConfig, RequestCoordinator};
pub use error::{ControllerError, Result};
pub use outcome::{CycleOutcome, CycleReport, DenyReason};
pub use state_machine::{CoordinatorState, StateMachine, StateTransition};
