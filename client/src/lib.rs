// client/src/lib.rs
pub mod api;
pub mod auth;
pub mod error;
pub mod guard;
pub mod limiter;
pub mod preview;
pub mod storage;
pub mod tracker;
pub mod wallet;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

use common::Config;

pub use api::{ApiClient, HealthReport, HttpTransport, ReqwestTransport, RequestOptions};
pub use auth::{AuthController, AuthEvent, AuthPhase, SessionState, SignInOptions, SignInOutcome};
pub use error::{ApiError, ClientError, Result};
pub use guard::RoleAccess;
pub use limiter::UnauthorizedLimiter;
pub use preview::PreviewController;
pub use storage::{FileKvStore, KeyValueStore, MemoryKvStore, SessionStore};
pub use tracker::{poll_until, PollOutcome, PollPolicy, TxTracker};
pub use wallet::{LocalWallet, SignScope, WalletAccount, WalletConnector, WalletSession};

/// Everything a front end needs, wired around one shared session.
pub struct CampusClient {
    config: Config,
    state: Arc<SessionState>,
    preview: Arc<PreviewController>,
    auth: AuthController,
    tracker: TxTracker,
}

impl CampusClient {
    /// File-backed store and the reqwest transport, both from `config`.
    pub fn from_config(config: Config, connectors: Vec<Arc<dyn WalletConnector>>) -> Result<Self> {
        let store = SessionStore::file(&config.client.session_store_path);
        let transport = ReqwestTransport::new(Duration::from_secs(config.client.request_timeout_secs))?;
        Self::with_parts(config, store, Arc::new(transport), connectors)
    }

    pub fn with_parts(
        config: Config,
        store: SessionStore,
        transport: Arc<dyn HttpTransport>,
        connectors: Vec<Arc<dyn WalletConnector>>,
    ) -> Result<Self> {
        let limiter = UnauthorizedLimiter::new(Duration::from_millis(config.client.unauthorized_debounce_ms));
        let state = Arc::new(SessionState::new(store.clone(), config.routes.clone(), limiter));

        let api = ApiClient::new(&config.client.api_base_url, transport, state.clone())?
            .with_unauthorized_handler(state.clone());

        let wallets = Arc::new(WalletSession::new(connectors));
        let preview = Arc::new(PreviewController::new(store));
        let tracker = TxTracker::new(api.clone(), PollPolicy::from(&config.tracker));
        let auth = AuthController::new(state.clone(), api, wallets, preview.clone());

        Ok(Self {
            config,
            state,
            preview,
            auth,
            tracker,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn auth(&self) -> &AuthController {
        &self.auth
    }

    pub fn api(&self) -> &ApiClient {
        self.auth.api()
    }

    pub fn tracker(&self) -> &TxTracker {
        &self.tracker
    }

    pub fn preview(&self) -> &PreviewController {
        &self.preview
    }

    pub fn store(&self) -> &SessionStore {
        self.state.store()
    }

    /// Current permissions from the preview identity and verified session.
    pub fn access(&self) -> RoleAccess {
        RoleAccess::derive(&self.preview.current(), self.state.session().as_ref())
    }
}
