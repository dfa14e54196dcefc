//! The decision channel seam and its last-message slot.
//!
//! The transport callback and the coordinator share exactly one value: the
//! most recent decision message and the instant it arrived. A newer message
//! overwrites an older one; nothing is queued. The coordinator decides
//! whether what it reads is fresh by comparing the arrival instant with the
//! instant its own request was sent.

#![allow(async_fn_in_trait)]

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::Result;

/// A raw decision message stamped with its arrival time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundDecision {
    pub payload: String,
    pub received_at: Instant,
}

/// Single-value, overwrite-only store for the latest decision.
///
/// Cloning yields another handle to the same slot.
///
/// # Examples
///
/// ```
/// use latchkey_network::DecisionSlot;
///
/// let slot = DecisionSlot::new();
/// assert!(slot.latest().is_none());
///
/// slot.store("{\"status\":\"deny\"}");
/// slot.store("{\"status\":\"allow\"}");
/// assert_eq!(slot.latest().unwrap().payload, "{\"status\":\"allow\"}");
/// ```
#[derive(Debug, Clone)]
pub struct DecisionSlot {
    inner: Arc<watch::Sender<Option<InboundDecision>>>,
}

impl DecisionSlot {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { inner: Arc::new(tx) }
    }

    /// Store a message received now. Trailing newlines are dropped.
    pub fn store(&self, payload: &str) {
        self.store_at(payload, Instant::now());
    }

    /// Store a message with an explicit arrival instant.
    pub fn store_at(&self, payload: &str, received_at: Instant) {
        self.inner.send_replace(Some(InboundDecision {
            payload: payload.trim_end_matches(['\r', '\n']).to_string(),
            received_at,
        }));
    }

    /// The most recent message, if any has arrived.
    pub fn latest(&self) -> Option<InboundDecision> {
        self.inner.borrow().clone()
    }

    /// Subscribe to slot updates.
    pub fn subscribe(&self) -> watch::Receiver<Option<InboundDecision>> {
        self.inner.subscribe()
    }
}

impl Default for DecisionSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Request/decision transport towards the access authority.
pub trait DecisionChannel: Send + Sync {
    /// Publish a serialized access request.
    ///
    /// Returning `Ok` means the request was handed to the transport within
    /// its bound; it says nothing about whether a decision will follow.
    async fn publish_request(&self, payload: &str) -> Result<()>;

    /// The most recent decision message, fresh or not.
    fn latest_decision(&self) -> Option<InboundDecision>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_newer_message_overwrites() {
        let slot = DecisionSlot::new();
        slot.store("{\"status\":\"deny\"}\n");
        tokio::time::advance(Duration::from_millis(10)).await;
        slot.store("{\"status\":\"allow\"}\r\n");

        let latest = slot.latest().unwrap();
        assert_eq!(latest.payload, "{\"status\":\"allow\"}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_the_slot() {
        let writer = DecisionSlot::new();
        let reader = writer.clone();
        let mut updates = reader.subscribe();

        let at = Instant::now();
        writer.store_at("{\"status\":\"allow\"}", at);

        updates.changed().await.unwrap();
        assert_eq!(reader.latest().unwrap().received_at, at);
    }
}
