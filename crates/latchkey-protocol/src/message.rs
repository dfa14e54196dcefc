//! JSON documents exchanged with the access authority.
//!
//! Requests go out as `{"type": "<kind>", "data": "<credential>"}` where
//! fingerprint data is base64 (standard alphabet) and RFID/QR data is the
//! credential text. Decisions come back as `{"status": "allow" | "deny"}`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use latchkey_core::{CredentialEvent, CredentialKind, DecisionStatus, Error, Result};
use serde::{Deserialize, Serialize};

/// Outgoing access request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    #[serde(rename = "type")]
    pub kind: CredentialKind,
    pub data: String,
}

impl AccessRequest {
    /// Build the request for a credential.
    ///
    /// # Examples
    ///
    /// ```
    /// use latchkey_core::{CredentialEvent, CredentialKind};
    /// use latchkey_protocol::AccessRequest;
    ///
    /// let event = CredentialEvent::now(CredentialKind::Fingerprint, vec![0x00, 0xFF]);
    /// let request = AccessRequest::from_event(&event);
    /// assert_eq!(request.data, "AP8=");
    /// ```
    #[must_use]
    pub fn from_event(event: &CredentialEvent) -> Self {
        let data = if event.kind().is_binary() {
            STANDARD.encode(event.payload())
        } else {
            String::from_utf8_lossy(event.payload()).into_owned()
        };
        Self {
            kind: event.kind(),
            data,
        }
    }

    /// Serialize to the wire document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidParameter(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct DecisionDocument {
    status: String,
}

/// Parse a decision document.
///
/// `"allow"` allows; any other status string denies.
///
/// # Errors
///
/// Returns [`Error::MalformedDecision`] if the text is not JSON or has no
/// string `status` field.
///
/// # Examples
///
/// ```
/// use latchkey_core::DecisionStatus;
/// use latchkey_protocol::parse_decision;
///
/// assert_eq!(parse_decision(r#"{"status":"allow"}"#).unwrap(), DecisionStatus::Allow);
/// assert_eq!(parse_decision(r#"{"status":"later"}"#).unwrap(), DecisionStatus::Deny);
/// assert!(parse_decision("allow").is_err());
/// ```
pub fn parse_decision(text: &str) -> Result<DecisionStatus> {
    let document: DecisionDocument = serde_json::from_str(text.trim())
        .map_err(|e| Error::MalformedDecision(e.to_string()))?;
    Ok(DecisionStatus::from_status(&document.status))
}
