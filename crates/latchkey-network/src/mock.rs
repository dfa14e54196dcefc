//! In-memory decision channel for development and testing.
//!
//! The handle side plays the access authority: it sees every published
//! request, can drop a decision into the slot at any instant, and can script
//! a reply that arrives a fixed delay after the next publish.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::channel::{DecisionChannel, DecisionSlot, InboundDecision};
use crate::error::{ChannelError, Result};

#[derive(Debug)]
struct ScriptedReply {
    payload: String,
    after: Duration,
}

#[derive(Debug)]
struct PendingReply {
    payload: String,
    due: Instant,
}

#[derive(Debug, Default)]
struct ChannelState {
    published: Vec<(String, Instant)>,
    scripted: VecDeque<ScriptedReply>,
    pending: Option<PendingReply>,
    fail_publish: Option<String>,
}

fn lock(state: &Mutex<ChannelState>) -> MutexGuard<'_, ChannelState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Decision channel backed by shared memory.
#[derive(Debug)]
pub struct MockDecisionChannel {
    slot: DecisionSlot,
    state: Arc<Mutex<ChannelState>>,
}

impl MockDecisionChannel {
    pub fn new() -> (Self, MockDecisionHandle) {
        let slot = DecisionSlot::new();
        let state = Arc::new(Mutex::new(ChannelState::default()));
        (
            Self {
                slot: slot.clone(),
                state: Arc::clone(&state),
            },
            MockDecisionHandle { slot, state },
        )
    }

    fn flush_due_reply(&self) {
        let mut state = lock(&self.state);
        let due = matches!(&state.pending, Some(reply) if reply.due <= Instant::now());
        if due {
            if let Some(reply) = state.pending.take() {
                self.slot.store_at(&reply.payload, reply.due);
            }
        }
    }
}

impl DecisionChannel for MockDecisionChannel {
    async fn publish_request(&self, payload: &str) -> Result<()> {
        let mut state = lock(&self.state);
        if let Some(message) = state.fail_publish.clone() {
            return Err(ChannelError::PublishFailed(message));
        }

        let now = Instant::now();
        state.published.push((payload.to_string(), now));
        state.pending = state.scripted.pop_front().map(|reply| PendingReply {
            payload: reply.payload,
            due: now + reply.after,
        });
        Ok(())
    }

    fn latest_decision(&self) -> Option<InboundDecision> {
        self.flush_due_reply();
        self.slot.latest()
    }
}

/// Authority side of a [`MockDecisionChannel`].
#[derive(Debug, Clone)]
pub struct MockDecisionHandle {
    slot: DecisionSlot,
    state: Arc<Mutex<ChannelState>>,
}

impl MockDecisionHandle {
    /// Payloads published so far, oldest first.
    pub fn published(&self) -> Vec<String> {
        lock(&self.state)
            .published
            .iter()
            .map(|(payload, _)| payload.clone())
            .collect()
    }

    /// Instant of the most recent publish.
    pub fn last_published_at(&self) -> Option<Instant> {
        lock(&self.state).published.last().map(|(_, at)| *at)
    }

    pub fn publish_count(&self) -> usize {
        lock(&self.state).published.len()
    }

    /// Deliver a decision received now.
    pub fn deliver(&self, payload: &str) {
        self.slot.store(payload);
    }

    /// Deliver a decision with an explicit arrival instant.
    pub fn deliver_at(&self, payload: &str, received_at: Instant) {
        self.slot.store_at(payload, received_at);
    }

    /// Answer the next publish with `payload`, `after` it was sent.
    ///
    /// A scripted reply that is still in flight when the following publish
    /// happens is dropped.
    pub fn respond_with(&self, payload: &str, after: Duration) {
        lock(&self.state).scripted.push_back(ScriptedReply {
            payload: payload.to_string(),
            after,
        });
    }

    /// Make every publish fail with `message`, or succeed again with `None`.
    pub fn fail_publishes(&self, message: Option<&str>) {
        lock(&self.state).fail_publish = message.map(str::to_string);
    }
}
