//! Results of a decision cycle.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use latchkey_core::CredentialKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a cycle did not unlock the door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The authority answered with anything but `allow`.
    Decision,
    /// No applicable decision arrived within the response window.
    Timeout,
    /// The request could not be published.
    PublishFailed,
    /// A local failure: sources could not be stopped, the request could not
    /// be serialized or the relay could not be driven.
    Internal,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            DenyReason::Decision => "decision",
            DenyReason::Timeout => "timeout",
            DenyReason::PublishFailed => "publish_failed",
            DenyReason::Internal => "internal",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum CycleOutcome {
    Allowed,
    Denied(DenyReason),
}

impl CycleOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, CycleOutcome::Allowed)
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::Allowed => f.write_str("allowed"),
            CycleOutcome::Denied(reason) => write!(f, "denied ({reason})"),
        }
    }
}

/// Summary of one credential's trip through the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub kind: CredentialKind,
    pub started_at: DateTime<Utc>,
    pub outcome: CycleOutcome,
    /// Time from selection of the credential until sources were re-armed.
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_string(&CycleOutcome::Denied(DenyReason::Timeout)).unwrap();
        assert_eq!(json, r#"{"outcome":"denied","reason":"timeout"}"#);

        let json = serde_json::to_string(&CycleOutcome::Allowed).unwrap();
        assert_eq!(json, r#"{"outcome":"allowed"}"#);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(CycleOutcome::Allowed.to_string(), "allowed");
        assert_eq!(
            CycleOutcome::Denied(DenyReason::PublishFailed).to_string(),
            "denied (publish_failed)"
        );
        assert!(!CycleOutcome::Denied(DenyReason::Decision).is_allowed());
    }
}
