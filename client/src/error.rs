// client/src/error.rs
use serde_json::Value;
use thiserror::Error;

/// Failure of a BFF call: HTTP status plus whatever the body decoded to.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
    /// Best-effort decoded body; `Value::Null` when empty
    pub payload: Value,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>, payload: Value) -> Self {
        Self {
            status,
            message: message.into(),
            payload,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("Connect wallet first")]
    WalletNotConnected,

    #[error("Selected wallet is unavailable: {0}")]
    WalletUnavailable(String),

    /// Wallet refused or failed to sign the challenge
    #[error("{0}")]
    Signing(String),

    #[error("invalid address: {0}")]
    InvalidAddress(#[from] common::AddressError),

    #[error("a sign-in attempt is already in progress")]
    SignInInProgress,

    /// The session was replaced or ended while a request for it was in flight
    #[error("session changed before the result could be applied")]
    SessionChanged,

    #[error("{0}")]
    Forbidden(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// HTTP status for errors that came back from the BFF.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api(e) => Some(e.status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
