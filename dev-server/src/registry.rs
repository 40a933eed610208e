// dev-server/src/registry.rs
use actix::{Actor, AsyncContext, Context, Handler, Message, MessageResult};
use chrono::{DateTime, Utc};
use common::{auth_message, decode_address, Role, TrackTxRequest, TxKind, TxState, TxStatusResponse};
use dashmap::DashMap;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::utils::token::generate_nonce;

// Unused challenges are dropped after five minutes
const DEFAULT_NONCE_TTL: i64 = 300;
const CLEANUP_INTERVAL_SECS: u64 = 60;
// Rounds handed out to confirmed transactions start here
const FIRST_ROUND: u64 = 1000;

/// Actor message: issue (or replace) the challenge for an address
#[derive(Message)]
#[rtype(result = "String")]
pub struct IssueNonce {
    pub address: String,
}

/// Actor message: check a signed challenge, consuming it on success
#[derive(Message)]
#[rtype(result = "Result<Role, ChallengeFailure>")]
pub struct VerifyChallenge {
    pub address: String,
    pub nonce: String,
    /// Base64 Ed25519 signature over the auth message
    pub signature: String,
}

/// Actor message: start tracking a transaction (idempotent by id)
#[derive(Message)]
#[rtype(result = "TxStatusResponse")]
pub struct TrackTx(pub TrackTxRequest);

/// Actor message: read a tracked transaction's status
#[derive(Message)]
#[rtype(result = "Option<TxStatusResponse>")]
pub struct GetTxStatus {
    pub tx_id: String,
}

/// Actor message: snapshot of registry counters
#[derive(Message)]
#[rtype(result = "RegistryStats")]
pub struct GetRegistryStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeFailure {
    UnknownNonce,
    NonceMismatch,
    BadSignature,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub pending_challenges: usize,
    pub tracked_transactions: usize,
    pub confirmed_transactions: usize,
    pub sign_ins: usize,
}

#[derive(Debug, Clone)]
struct Challenge {
    nonce: String,
    issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct TrackedTx {
    kind: TxKind,
    status: TxState,
    confirmed_round: Option<u64>,
    status_reads: u32,
}

impl TrackedTx {
    fn response(&self, tx_id: &str) -> TxStatusResponse {
        TxStatusResponse {
            tx_id: tx_id.to_string(),
            kind: self.kind,
            status: self.status,
            confirmed_round: self.confirmed_round,
        }
    }
}

/// Holds challenges, role assignments and tracked transactions.
pub struct CampusRegistry {
    // Map from address to outstanding challenge
    challenges: Arc<DashMap<String, Challenge>>,
    // Map from tx id to tracking state
    transactions: Arc<DashMap<String, TrackedTx>>,
    roles: HashMap<String, Role>,
    confirm_after_reads: u32,
    // Ids with this prefix settle as failed; empty disables it
    failing_prefix: String,
    nonce_ttl: i64,
    next_round: u64,
    sign_ins: usize,
}

impl CampusRegistry {
    pub fn new(roles: HashMap<String, Role>, confirm_after_reads: u32) -> Self {
        Self {
            challenges: Arc::new(DashMap::new()),
            transactions: Arc::new(DashMap::new()),
            // layered config lowercases map keys; addresses are upper-case base32
            roles: roles
                .into_iter()
                .map(|(address, role)| (address.to_ascii_uppercase(), role))
                .collect(),
            confirm_after_reads,
            failing_prefix: String::new(),
            nonce_ttl: DEFAULT_NONCE_TTL,
            next_round: FIRST_ROUND,
            sign_ins: 0,
        }
    }

    pub fn with_nonce_ttl(mut self, ttl_seconds: i64) -> Self {
        self.nonce_ttl = ttl_seconds;
        self
    }

    pub fn with_failing_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.failing_prefix = prefix.into();
        self
    }

    fn settles_as_failed(&self, tx_id: &str) -> bool {
        !self.failing_prefix.is_empty() && tx_id.starts_with(&self.failing_prefix)
    }

    fn role_for(&self, address: &str) -> Role {
        self.roles
            .get(&address.to_ascii_uppercase())
            .copied()
            .unwrap_or(Role::Student)
    }

    fn cleanup_challenges(&mut self) -> usize {
        let now = Utc::now();
        let before = self.challenges.len();
        self.challenges
            .retain(|_, challenge| now.signed_duration_since(challenge.issued_at).num_seconds() <= self.nonce_ttl);
        before - self.challenges.len()
    }
}

fn verify_signature(address: &str, message: &[u8], signature_b64: &str) -> bool {
    let Ok(public_key) = decode_address(address) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(&public_key) else {
        return false;
    };
    let Ok(raw) = base64::decode(signature_b64) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&raw) else {
        return false;
    };
    key.verify(message, &signature).is_ok()
}

impl Actor for CampusRegistry {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("CampusRegistry started with nonce TTL: {}s", self.nonce_ttl);

        ctx.run_interval(Duration::from_secs(CLEANUP_INTERVAL_SECS), |act, _ctx| {
            let expired = act.cleanup_challenges();
            if expired > 0 {
                tracing::info!("Dropped {} expired challenges", expired);
            }
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            "CampusRegistry stopped after {} sign-ins and {} tracked transactions",
            self.sign_ins,
            self.transactions.len()
        );
    }
}

impl Handler<IssueNonce> for CampusRegistry {
    type Result = MessageResult<IssueNonce>;

    fn handle(&mut self, msg: IssueNonce, _ctx: &mut Self::Context) -> Self::Result {
        let nonce = generate_nonce();
        self.challenges.insert(
            msg.address.clone(),
            Challenge {
                nonce: nonce.clone(),
                issued_at: Utc::now(),
            },
        );
        tracing::debug!("Issued challenge for {}", msg.address);
        MessageResult(nonce)
    }
}

impl Handler<VerifyChallenge> for CampusRegistry {
    type Result = MessageResult<VerifyChallenge>;

    fn handle(&mut self, msg: VerifyChallenge, _ctx: &mut Self::Context) -> Self::Result {
        let result = match self.challenges.get(&msg.address).map(|c| c.nonce.clone()) {
            None => Err(ChallengeFailure::UnknownNonce),
            Some(stored) if stored != msg.nonce => Err(ChallengeFailure::NonceMismatch),
            Some(_) => {
                let message = auth_message(&msg.nonce);
                if verify_signature(&msg.address, message.as_bytes(), &msg.signature) {
                    self.challenges.remove(&msg.address);
                    self.sign_ins += 1;
                    let role = self.role_for(&msg.address);
                    tracing::info!("Verified {} as {}", msg.address, role);
                    Ok(role)
                } else {
                    Err(ChallengeFailure::BadSignature)
                }
            }
        };

        if let Err(failure) = &result {
            tracing::warn!("Challenge for {} rejected: {:?}", msg.address, failure);
        }
        MessageResult(result)
    }
}

impl Handler<TrackTx> for CampusRegistry {
    type Result = MessageResult<TrackTx>;

    fn handle(&mut self, msg: TrackTx, _ctx: &mut Self::Context) -> Self::Result {
        let request = msg.0;
        let entry = self
            .transactions
            .entry(request.tx_id.clone())
            .or_insert_with(|| {
                tracing::info!("Tracking {} transaction {}", request.kind, request.tx_id);
                TrackedTx {
                    kind: request.kind,
                    status: TxState::Pending,
                    confirmed_round: None,
                    status_reads: 0,
                }
            });
        MessageResult(entry.response(&request.tx_id))
    }
}

impl Handler<GetTxStatus> for CampusRegistry {
    type Result = MessageResult<GetTxStatus>;

    fn handle(&mut self, msg: GetTxStatus, _ctx: &mut Self::Context) -> Self::Result {
        let fails = self.settles_as_failed(&msg.tx_id);
        let Some(mut entry) = self.transactions.get_mut(&msg.tx_id) else {
            return MessageResult(None);
        };

        let tx = entry.value_mut();
        if tx.status == TxState::Pending {
            tx.status_reads += 1;
            if tx.status_reads >= self.confirm_after_reads {
                if fails {
                    tx.status = TxState::Failed;
                    tracing::warn!("Transaction {} failed", msg.tx_id);
                } else {
                    tx.status = TxState::Confirmed;
                    tx.confirmed_round = Some(self.next_round);
                    self.next_round += 1;
                    tracing::info!("Transaction {} confirmed at round {}", msg.tx_id, self.next_round - 1);
                }
            }
        }
        MessageResult(Some(tx.response(&msg.tx_id)))
    }
}

impl Handler<GetRegistryStats> for CampusRegistry {
    type Result = MessageResult<GetRegistryStats>;

    fn handle(&mut self, _msg: GetRegistryStats, _ctx: &mut Self::Context) -> Self::Result {
        let confirmed = self
            .transactions
            .iter()
            .filter(|entry| entry.status == TxState::Confirmed)
            .count();

        MessageResult(RegistryStats {
            pending_challenges: self.challenges.len(),
            tracked_transactions: self.transactions.len(),
            confirmed_transactions: confirmed,
            sign_ins: self.sign_ins,
        })
    }
}
