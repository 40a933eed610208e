// common/src/models/tx.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a submitted transaction was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Vote,
    Checkin,
    Cert,
    Deposit,
    Feedback,
    Coordination,
    Ai,
    #[serde(other)]
    Other,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Vote => "vote",
            TxKind::Checkin => "checkin",
            TxKind::Cert => "cert",
            TxKind::Deposit => "deposit",
            TxKind::Feedback => "feedback",
            TxKind::Coordination => "coordination",
            TxKind::Ai => "ai",
            TxKind::Other => "other",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confirmation state reported by the BFF for a tracked transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxState {
    Pending,
    Confirmed,
    Failed,
    /// Anything the BFF reports that this client does not know; never terminal.
    #[serde(other)]
    Unknown,
}

impl TxState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxState::Confirmed | TxState::Failed)
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxState::Pending => "pending",
            TxState::Confirmed => "confirmed",
            TxState::Failed => "failed",
            TxState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Result of watching one transaction until it settled or the budget ran out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedTransaction {
    pub tx_id: String,
    pub kind: TxKind,
    pub status: TxState,
    pub confirmed_round: Option<u64>,
    /// Number of status polls performed
    pub attempts: u32,
    /// Polling stopped because the attempt budget ran out, not because the
    /// transaction settled. `status` is whatever was last observed.
    pub timed_out: bool,
}

impl TrackedTransaction {
    pub fn pending(tx_id: impl Into<String>, kind: TxKind) -> Self {
        Self {
            tx_id: tx_id.into(),
            kind,
            status: TxState::Pending,
            confirmed_round: None,
            attempts: 0,
            timed_out: false,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == TxState::Confirmed
    }

    /// One-line lifecycle message for presenting the outcome.
    pub fn summary(&self) -> String {
        match self.status {
            TxState::Confirmed => match self.confirmed_round {
                Some(round) => format!("Transaction confirmed: {} (round {})", self.tx_id, round),
                None => format!("Transaction confirmed: {}", self.tx_id),
            },
            TxState::Failed => format!("Transaction failed: {}", self.tx_id),
            TxState::Pending | TxState::Unknown => format!("Transaction still pending: {}", self.tx_id),
        }
    }
}
