//! Coordinator state machine.
//!
//! # States
//!
//! - `Armed`: every source armed, no request outstanding
//! - `Dispatching`: one credential selected, other sources disarmed, request
//!   being published
//! - `AwaitingDecision`: request published, polling the decision slot until
//!   the response window closes
//!
//! # Valid Transitions
//!
//! - Armed → Dispatching → AwaitingDecision → Armed
//! - Dispatching → Armed (request could not be published)
//!
//! # Examples
//!
//! ```
//! use latchkey_controller::{CoordinatorState, StateMachine};
//!
//! let mut machine = StateMachine::new();
//! assert_eq!(machine.current_state(), CoordinatorState::Armed);
//!
//! machine.transition_to(CoordinatorState::Dispatching).unwrap();
//! assert!(machine.transition_to(CoordinatorState::Dispatching).is_err());
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::{ControllerError, Result};

/// Maximum number of transitions kept in history.
///
/// A full cycle records three transitions, so this covers the last
/// thirty-odd cycles.
const MAX_HISTORY_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    /// Waiting for any source to produce a credential.
    Armed,

    /// Publishing the request for the selected credential.
    Dispatching,

    /// Waiting for the authority's decision.
    AwaitingDecision,
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            CoordinatorState::Armed => "Armed",
            CoordinatorState::Dispatching => "Dispatching",
            CoordinatorState::AwaitingDecision => "AwaitingDecision",
        };
        write!(f, "{}", state_str)
    }
}

impl CoordinatorState {
    /// Check if transition to target state is valid from this state.
    ///
    /// # Examples
    ///
    /// ```
    /// use latchkey_controller::CoordinatorState;
    ///
    /// assert!(CoordinatorState::Armed.can_transition_to(&CoordinatorState::Dispatching));
    /// assert!(!CoordinatorState::Armed.can_transition_to(&CoordinatorState::AwaitingDecision));
    /// ```
    pub fn can_transition_to(&self, target: &CoordinatorState) -> bool {
        matches!(
            (self, target),
            (CoordinatorState::Armed, CoordinatorState::Dispatching)
                | (
                    CoordinatorState::Dispatching,
                    CoordinatorState::AwaitingDecision | CoordinatorState::Armed
                )
                | (CoordinatorState::AwaitingDecision, CoordinatorState::Armed)
        )
    }

    /// Whether a credential request is outstanding in this state.
    pub fn is_busy(&self) -> bool {
        !matches!(self, CoordinatorState::Armed)
    }
}

/// A single state transition with timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: CoordinatorState,
    pub to: CoordinatorState,
    pub timestamp: Instant,
}

impl StateTransition {
    pub fn new(from: CoordinatorState, to: CoordinatorState) -> Self {
        Self {
            from,
            to,
            timestamp: Instant::now(),
        }
    }

    /// Time since this transition occurred.
    pub fn elapsed(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

/// Enforces valid coordinator transitions and keeps a bounded history.
///
/// Not thread-safe; owned by the coordinator's control loop.
#[derive(Debug)]
pub struct StateMachine {
    current_state: CoordinatorState,
    state_entered_at: Instant,
    history: VecDeque<StateTransition>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current_state: CoordinatorState::Armed,
            state_entered_at: Instant::now(),
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    pub fn current_state(&self) -> CoordinatorState {
        self.current_state
    }

    pub fn time_in_current_state(&self) -> Duration {
        self.state_entered_at.elapsed()
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Up to `count` most recent transitions, oldest first.
    pub fn last_transitions(&self, count: usize) -> Vec<StateTransition> {
        self.history
            .iter()
            .rev()
            .take(count)
            .rev()
            .copied()
            .collect()
    }

    /// Transition to a new state, validating the transition.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::InvalidTransition`] if the transition is not
    /// allowed from the current state; the machine is left unchanged.
    pub fn transition_to(&mut self, new_state: CoordinatorState) -> Result<StateTransition> {
        if !self.current_state.can_transition_to(&new_state) {
            return Err(ControllerError::InvalidTransition {
                from: self.current_state.to_string(),
                to: new_state.to_string(),
            });
        }

        let transition = StateTransition::new(self.current_state, new_state);
        self.perform_state_change(transition);
        Ok(transition)
    }

    /// Force the machine back to `Armed`.
    pub fn reset(&mut self) -> StateTransition {
        let transition = StateTransition::new(self.current_state, CoordinatorState::Armed);
        self.perform_state_change(transition);
        transition
    }

    fn perform_state_change(&mut self, transition: StateTransition) {
        self.current_state = transition.to;
        self.state_entered_at = transition.timestamp;

        if self.history.len() >= MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(transition);
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
