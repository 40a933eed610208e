// client/src/wallet.rs
//! Wallet connection management: a registry of connectors, the active
//! account, and data signing for the sign-in challenge.

use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use common::encode_address;

use crate::error::{ClientError, Result};

pub const LOCAL_WALLET_ID: &str = "local";

/// What a signature is for. The scope only labels the request for the
/// wallet; the signed bytes are the caller's data unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignScope {
    Auth,
    General,
}

impl SignScope {
    pub fn domain(&self) -> &'static str {
        match self {
            SignScope::Auth => "algocampus-auth",
            SignScope::General => "algocampus",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAccount {
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedData {
    pub data: Vec<u8>,
    /// Ed25519 public key of the signer
    pub signer: [u8; 32],
    /// Label from [`SignScope::domain`]; not part of the signed bytes
    pub domain: String,
    pub signature: Vec<u8>,
}

/// A wallet implementation the session can connect through.
#[async_trait]
pub trait WalletConnector: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    async fn connect(&self) -> Result<Vec<WalletAccount>>;

    async fn disconnect(&self) -> Result<()>;

    /// Accounts from a previous connection, if the wallet remembers one.
    async fn resume(&self) -> Result<Option<Vec<WalletAccount>>> {
        Ok(None)
    }

    async fn sign_data(&self, address: &str, data: &[u8], scope: SignScope) -> Result<SignedData>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveWallet {
    wallet_id: String,
    account: WalletAccount,
}

/// Tracks which connector and account are active.
pub struct WalletSession {
    connectors: Vec<Arc<dyn WalletConnector>>,
    active: RwLock<Option<ActiveWallet>>,
}

impl WalletSession {
    pub fn new(connectors: Vec<Arc<dyn WalletConnector>>) -> Self {
        Self {
            connectors,
            active: RwLock::new(None),
        }
    }

    pub fn wallet_ids(&self) -> Vec<String> {
        self.connectors.iter().map(|c| c.id().to_string()).collect()
    }

    fn connector(&self, wallet_id: &str) -> Option<Arc<dyn WalletConnector>> {
        self.connectors.iter().find(|c| c.id() == wallet_id).cloned()
    }

    fn set_active(&self, active: Option<ActiveWallet>) {
        let mut slot = self.active.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = active;
    }

    fn active(&self) -> Option<ActiveWallet> {
        self.active
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn active_address(&self) -> Option<String> {
        self.active().map(|a| a.account.address)
    }

    pub fn active_wallet_id(&self) -> Option<String> {
        self.active().map(|a| a.wallet_id)
    }

    pub fn is_connected(&self) -> bool {
        self.active().is_some()
    }

    /// Connect a wallet and make its first account active.
    pub async fn connect(&self, wallet_id: &str) -> Result<WalletAccount> {
        let connector = self
            .connector(wallet_id)
            .ok_or_else(|| ClientError::WalletUnavailable(wallet_id.to_string()))?;

        let accounts = connector.connect().await?;
        let account = accounts
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::WalletUnavailable(format!("{} exposed no accounts", wallet_id)))?;

        tracing::info!("Wallet {} connected with account {}", wallet_id, account.address);
        self.set_active(Some(ActiveWallet {
            wallet_id: wallet_id.to_string(),
            account: account.clone(),
        }));
        Ok(account)
    }

    /// Restore the first wallet that remembers a previous connection.
    pub async fn resume(&self) -> Option<WalletAccount> {
        for connector in &self.connectors {
            match connector.resume().await {
                Ok(Some(accounts)) => {
                    if let Some(account) = accounts.into_iter().next() {
                        tracing::info!("Resumed wallet {} with account {}", connector.id(), account.address);
                        self.set_active(Some(ActiveWallet {
                            wallet_id: connector.id().to_string(),
                            account: account.clone(),
                        }));
                        return Some(account);
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Failed to resume wallet {}: {}", connector.id(), e),
            }
        }
        None
    }

    pub async fn disconnect(&self) -> Result<()> {
        if let Some(active) = self.active() {
            if let Some(connector) = self.connector(&active.wallet_id) {
                connector.disconnect().await?;
            }
            tracing::info!("Wallet {} disconnected", active.wallet_id);
        }
        self.set_active(None);
        Ok(())
    }

    /// Sign with the active account.
    pub async fn sign_data(&self, data: &[u8], scope: SignScope) -> Result<SignedData> {
        let active = self.active().ok_or(ClientError::WalletNotConnected)?;
        let connector = self
            .connector(&active.wallet_id)
            .ok_or_else(|| ClientError::WalletUnavailable(active.wallet_id.clone()))?;
        connector.sign_data(&active.account.address, data, scope).await
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredWallet {
    address: String,
    public_key_hex: String,
    secret_key_hex: String,
}

/// Ed25519 key held in-process: the development account used against a
/// local network or the dev server.
pub struct LocalWallet {
    signing_key: SigningKey,
    address: String,
    connected: AtomicBool,
}

impl LocalWallet {
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(secret))
    }

    pub fn from_secret_hex(secret_hex: &str) -> Result<Self> {
        let bytes = hex::decode(secret_hex.trim())
            .map_err(|e| ClientError::Config(format!("invalid wallet secret: {}", e)))?;
        let secret: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ClientError::Config("wallet secret must be 32 bytes".to_string()))?;
        Ok(Self::from_secret_bytes(&secret))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = encode_address(signing_key.verifying_key().as_bytes());
        Self {
            signing_key,
            address,
            connected: AtomicBool::new(false),
        }
    }

    /// Load the key file, creating a fresh key there if none exists.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let raw = fs::read_to_string(path)?;
            let stored: StoredWallet = serde_json::from_str(&raw)?;
            let wallet = Self::from_secret_hex(&stored.secret_key_hex)?;
            if wallet.address != stored.address {
                return Err(ClientError::Config(format!(
                    "wallet file {} address does not match its key",
                    path.display()
                )));
            }
            return Ok(wallet);
        }

        let wallet = Self::generate();
        wallet.save(path)?;
        tracing::info!("Created development wallet {} at {}", wallet.address, path.display());
        Ok(wallet)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let stored = StoredWallet {
            address: self.address.clone(),
            public_key_hex: hex::encode(self.signing_key.verifying_key().as_bytes()),
            secret_key_hex: hex::encode(self.signing_key.to_bytes()),
        };
        fs::write(path, serde_json::to_vec_pretty(&stored)?)?;
        Ok(())
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    fn account(&self) -> WalletAccount {
        WalletAccount {
            name: "Local Dev Account".to_string(),
            address: self.address.clone(),
        }
    }
}

#[async_trait]
impl WalletConnector for LocalWallet {
    fn id(&self) -> &str {
        LOCAL_WALLET_ID
    }

    fn name(&self) -> &str {
        "Local Wallet"
    }

    async fn connect(&self) -> Result<Vec<WalletAccount>> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(vec![self.account()])
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&self) -> Result<Option<Vec<WalletAccount>>> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(Some(vec![self.account()]))
        } else {
            Ok(None)
        }
    }

    async fn sign_data(&self, address: &str, data: &[u8], scope: SignScope) -> Result<SignedData> {
        if address != self.address {
            return Err(ClientError::Signing(format!("account {} is not held by this wallet", address)));
        }

        let signature: Signature = self.signing_key.sign(data);
        Ok(SignedData {
            data: data.to_vec(),
            signer: self.public_key(),
            domain: scope.domain().to_string(),
            signature: signature.to_bytes().to_vec(),
        })
    }
}
