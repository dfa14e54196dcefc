use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// The kind of reader a credential came from.
///
/// The kind only matters when tagging an outgoing request; arbitration
/// treats every source the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    Fingerprint,
    Rfid,
    Qr,
}

impl CredentialKind {
    /// Type tag carried in the `type` field of an access request.
    #[must_use]
    pub fn type_tag(&self) -> &'static str {
        match self {
            CredentialKind::Fingerprint => "fingerprint",
            CredentialKind::Rfid => "rfid",
            CredentialKind::Qr => "qr",
        }
    }

    /// Whether the payload is binary and must be text-encoded for transport.
    #[must_use]
    pub fn is_binary(&self) -> bool {
        matches!(self, CredentialKind::Fingerprint)
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_tag())
    }
}

/// A credential produced by exactly one source.
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialEvent {
    kind: CredentialKind,
    payload: Vec<u8>,
    observed_at: Instant,
}

impl CredentialEvent {
    #[must_use]
    pub fn new(kind: CredentialKind, payload: Vec<u8>, observed_at: Instant) -> Self {
        Self {
            kind,
            payload,
            observed_at,
        }
    }

    /// Create an event observed at the current monotonic instant.
    #[must_use]
    pub fn now(kind: CredentialKind, payload: Vec<u8>) -> Self {
        Self::new(kind, payload, Instant::now())
    }

    #[must_use]
    pub fn kind(&self) -> CredentialKind {
        self.kind
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn observed_at(&self) -> Instant {
        self.observed_at
    }
}

/// Verdict of the remote authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Allow,
    Deny,
}

impl DecisionStatus {
    /// Map a status string onto a verdict. Anything but `"allow"` denies.
    #[must_use]
    pub fn from_status(status: &str) -> Self {
        if status == "allow" {
            DecisionStatus::Allow
        } else {
            DecisionStatus::Deny
        }
    }
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionStatus::Allow => f.write_str("allow"),
            DecisionStatus::Deny => f.write_str("deny"),
        }
    }
}

/// A parsed decision together with the instant it reached this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionMessage {
    pub status: DecisionStatus,
    pub received_at: Instant,
}

impl DecisionMessage {
    /// A decision applies to a request only if it arrived at or after the
    /// request was sent. Anything older belongs to an earlier cycle.
    #[must_use]
    pub fn applies_to(&self, sent_at: Instant) -> bool {
        self.received_at >= sent_at
    }
}

/// The single in-flight request of a cycle.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    credential: CredentialEvent,
    sent_at: Instant,
    deadline: Instant,
}

impl PendingRequest {
    #[must_use]
    pub fn new(credential: CredentialEvent, sent_at: Instant, window: Duration) -> Self {
        Self {
            credential,
            sent_at,
            deadline: sent_at + window,
        }
    }

    #[must_use]
    pub fn credential(&self) -> &CredentialEvent {
        &self.credential
    }

    #[must_use]
    pub fn sent_at(&self) -> Instant {
        self.sent_at
    }

    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Expired once strictly past the deadline.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        now > self.deadline
    }

    /// Whether `decision` belongs to this request: it arrived no earlier
    /// than the request was sent and no later than the deadline.
    #[must_use]
    pub fn accepts(&self, decision: &DecisionMessage) -> bool {
        decision.applies_to(self.sent_at) && decision.received_at <= self.deadline
    }
}
