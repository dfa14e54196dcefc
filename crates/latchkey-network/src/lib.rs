//! Decision channel between the door controller and its access authority.
//!
//! The controller publishes one access request per credential and then
//! watches a single slot holding the most recent decision message. This
//! crate provides the seam ([`DecisionChannel`]), the slot
//! ([`DecisionSlot`]), an MQTT implementation ([`MqttChannel`]) and an
//! in-memory one for tests ([`mock::MockDecisionChannel`]).
//!
//! # Topics
//!
//! | Direction | Topic                          |
//! |-----------|--------------------------------|
//! | outbound  | `access/door/<door_id>/request`  |
//! | inbound   | `access/door/<door_id>/decision` |

pub mod channel;
pub mod error;
pub mod mock;
pub mod mqtt;

pub use channel::{DecisionChannel, DecisionSlot, InboundDecision};
pub use error::{ChannelError, Result};
pub use mqtt::MqttChannel;
