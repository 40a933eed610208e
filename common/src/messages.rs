// common/src/messages.rs
// Request and response bodies exchanged with the BFF.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{Role, TxKind, TxState};

/// Prefix of the message a wallet signs during sign-in.
pub const AUTH_MESSAGE_PREFIX: &str = "AlgoCampus auth nonce: ";

/// Canonical challenge message for a nonce.
pub fn auth_message(nonce: &str) -> String {
    format!("{}{}", AUTH_MESSAGE_PREFIX, nonce)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceRequest {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceResponse {
    pub nonce: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub address: String,
    pub nonce: String,
    /// Base64 Ed25519 signature over `auth_message(nonce)`
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub jwt: String,
}

/// Authenticated profile returned by `GET /me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeResponse {
    pub address: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackTxRequest {
    pub tx_id: String,
    pub kind: TxKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_address: Option<String>,
}

impl TrackTxRequest {
    pub fn new(tx_id: impl Into<String>, kind: TxKind) -> Self {
        Self {
            tx_id: tx_id.into(),
            kind,
            session_id: None,
            course_code: None,
            student_address: None,
        }
    }

    /// Attach the attendance context the BFF needs to record a check-in.
    pub fn for_checkin(mut self, session_id: u64, course_code: impl Into<String>, student_address: impl Into<String>) -> Self {
        self.session_id = Some(session_id);
        self.course_code = Some(course_code.into());
        self.student_address = Some(student_address.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxStatusResponse {
    pub tx_id: String,
    pub kind: TxKind,
    pub status: TxState,
    #[serde(default)]
    pub confirmed_round: Option<u64>,
}

/// Error body used by the BFF on non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub detail: String,
}

impl ErrorPayload {
    pub fn new(detail: impl Into<String>) -> Self {
        Self { detail: detail.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Ok,
    Degraded,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    pub detail: String,
}

/// Readiness of the BFF and the services behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemHealthResponse {
    pub status: ComponentStatus,
    pub service: String,
    #[serde(default)]
    pub components: BTreeMap<String, ComponentHealth>,
}
