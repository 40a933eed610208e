// client/src/auth.rs
//! Session lifecycle: bootstrap from the store, wallet challenge-response
//! sign-in, profile refresh, logout and debounced handling of expired
//! tokens.
//!
//! [`SessionState`] is the single owner of the in-memory session. The API
//! client reads the bearer token from it and reports 401s back to it, so the
//! two are wired once at composition time:
//!
//! ```ignore
//! let state = Arc::new(SessionState::new(store, routes, limiter));
//! let api = ApiClient::new(base_url, transport, state.clone())?
//!     .with_unauthorized_handler(state.clone());
//! let auth = AuthController::new(state, api, wallets, preview);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

use common::{auth_message, decode_address, MeResponse, Role, RouteConfig, Session, VerifyRequest};

use crate::api::{ApiClient, TokenProvider, UnauthorizedHandler, SESSION_EXPIRED_MESSAGE};
use crate::error::{ClientError, Result};
use crate::limiter::UnauthorizedLimiter;
use crate::preview::PreviewController;
use crate::storage::SessionStore;
use crate::wallet::{SignScope, WalletAccount, WalletSession};

const EVENT_CAPACITY: usize = 64;
pub const WALLET_DISCONNECTED_MESSAGE: &str = "Wallet disconnected";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    /// Bootstrap has not finished
    Unknown,
    Anonymous,
    Authenticated,
}

/// Lifecycle notifications for whatever presents the session to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn { address: String, role: Role },
    LoggedOut { reason: Option<String> },
    Redirect { path: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignInOptions {
    pub redirect: bool,
    pub clear_preview: bool,
    pub notify: bool,
}

impl Default for SignInOptions {
    fn default() -> Self {
        Self {
            redirect: true,
            clear_preview: true,
            notify: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInOutcome {
    pub profile: MeResponse,
    /// Role home the caller was sent to, when redirects were requested
    pub redirect: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionSlot {
    phase: AuthPhase,
    token: Option<String>,
    role: Option<Role>,
    address: Option<String>,
}

impl Default for SessionSlot {
    fn default() -> Self {
        Self {
            phase: AuthPhase::Unknown,
            token: None,
            role: None,
            address: None,
        }
    }
}

impl SessionSlot {
    fn anonymous() -> Self {
        Self {
            phase: AuthPhase::Anonymous,
            ..Self::default()
        }
    }

    fn from_session(session: Session) -> Self {
        Self {
            phase: AuthPhase::Authenticated,
            token: Some(session.token),
            role: Some(session.role),
            address: Some(session.address),
        }
    }

    fn session(&self) -> Option<Session> {
        Session::from_parts(self.token.clone(), self.role, self.address.clone())
    }
}

/// Shared in-memory session plus the side effects of ending it.
pub struct SessionState {
    slot: RwLock<SessionSlot>,
    store: SessionStore,
    routes: RouteConfig,
    limiter: UnauthorizedLimiter,
    events: broadcast::Sender<AuthEvent>,
    // 401s while restoring a stored session end in a silent logout instead
    bootstrapping: AtomicBool,
}

impl SessionState {
    pub fn new(store: SessionStore, routes: RouteConfig, limiter: UnauthorizedLimiter) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            slot: RwLock::new(SessionSlot::default()),
            store,
            routes,
            limiter,
            events,
            bootstrapping: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn routes(&self) -> &RouteConfig {
        &self.routes
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: AuthEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn read(&self) -> SessionSlot {
        self.slot.read().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    fn write<F>(&self, f: F)
    where
        F: FnOnce(&mut SessionSlot),
    {
        let mut slot = self.slot.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut slot);
    }

    // Persist and install `session` only while the slot still holds
    // `expected`. Runs under the slot lock so a concurrent logout either
    // lands first and wins, or lands after and clears this session.
    fn commit(&self, expected: &str, session: Session) -> Result<()> {
        let mut slot = self.slot.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.token.as_deref() != Some(expected) {
            return Err(ClientError::SessionChanged);
        }
        self.store.save_session(&session)?;
        *slot = SessionSlot::from_session(session);
        Ok(())
    }

    pub fn phase(&self) -> AuthPhase {
        self.read().phase
    }

    pub fn session(&self) -> Option<Session> {
        self.read().session()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_some()
    }

    /// Clear memory and store, then announce it. Store failures are logged;
    /// the in-memory session is gone regardless.
    pub fn logout(&self, reason: Option<&str>, redirect: bool) {
        self.write(|slot| *slot = SessionSlot::anonymous());
        if let Err(e) = self.store.clear_session() {
            tracing::warn!("Failed to clear stored session: {}", e);
        }

        tracing::info!("Logged out{}", reason.map(|r| format!(": {}", r)).unwrap_or_default());
        self.emit(AuthEvent::LoggedOut {
            reason: reason.map(str::to_string),
        });
        if redirect {
            self.emit(AuthEvent::Redirect {
                path: self.routes.sign_in.clone(),
            });
        }
    }
}

impl TokenProvider for SessionState {
    fn token(&self) -> Option<String> {
        self.read().token
    }
}

impl UnauthorizedHandler for SessionState {
    fn on_unauthorized(&self) {
        if self.bootstrapping.load(Ordering::SeqCst) {
            tracing::debug!("401 during bootstrap, leaving recovery to bootstrap");
            return;
        }
        if self.limiter.notify_once() {
            self.logout(Some(SESSION_EXPIRED_MESSAGE), true);
        }
    }
}

/// Resets the in-flight flag however the sign-in future ends, including
/// being dropped mid-flight.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ClientError::SignInInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct AuthController {
    state: Arc<SessionState>,
    api: ApiClient,
    wallets: Arc<WalletSession>,
    preview: Arc<PreviewController>,
    signing_in: AtomicBool,
}

impl AuthController {
    /// `api` must read its token from, and report 401s to, `state`.
    pub fn new(
        state: Arc<SessionState>,
        api: ApiClient,
        wallets: Arc<WalletSession>,
        preview: Arc<PreviewController>,
    ) -> Self {
        Self {
            state,
            api,
            wallets,
            preview,
            signing_in: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn wallets(&self) -> &Arc<WalletSession> {
        &self.wallets
    }

    pub fn phase(&self) -> AuthPhase {
        self.state.phase()
    }

    pub fn session(&self) -> Option<Session> {
        self.state.session()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.state.subscribe()
    }

    /// Restore a stored session and confirm it with the BFF. Any failure
    /// logs out silently; the result is always a settled phase.
    pub async fn bootstrap(&self) -> AuthPhase {
        let Some(session) = self.state.store.load_session() else {
            tracing::debug!("No stored session");
            self.state.write(|slot| *slot = SessionSlot::anonymous());
            return AuthPhase::Anonymous;
        };

        tracing::info!("Restoring session for {}", session.address);
        self.state.write(|slot| *slot = SessionSlot::from_session(session));

        self.state.bootstrapping.store(true, Ordering::SeqCst);
        let refreshed = self.refresh_profile().await;
        self.state.bootstrapping.store(false, Ordering::SeqCst);

        match refreshed {
            Ok(_) => AuthPhase::Authenticated,
            Err(ClientError::SessionChanged) => {
                tracing::debug!("Session replaced during bootstrap");
                self.state.phase()
            }
            Err(e) => {
                tracing::warn!("Stored session rejected, signing out: {}", e);
                self.state.logout(None, false);
                AuthPhase::Anonymous
            }
        }
    }

    /// Nonce, signature, verification, profile, then persistence. Nothing
    /// is persisted unless every step succeeds.
    pub async fn sign_in(&self, options: SignInOptions) -> Result<SignInOutcome> {
        let _in_flight = InFlight::acquire(&self.signing_in)?;

        let address = self.wallets.active_address().ok_or(ClientError::WalletNotConnected)?;
        decode_address(&address)?;

        let challenge = self.api.request_nonce(&address).await?;
        let message = auth_message(&challenge.nonce);
        tracing::debug!("Signing auth challenge for {}", address);

        let signed = self
            .wallets
            .sign_data(message.as_bytes(), SignScope::Auth)
            .await
            .map_err(|e| ClientError::Signing(format!("Message signing failed: {}", e)))?;

        let verified = self
            .api
            .verify(&VerifyRequest {
                address: address.clone(),
                nonce: challenge.nonce,
                signature: base64::encode(&signed.signature),
            })
            .await?;

        let previous = self.state.read();
        let jwt = verified.jwt;
        self.state.write(|slot| slot.token = Some(jwt.clone()));

        let profile = match self.api.me().await {
            Ok(profile) => profile,
            Err(e) => {
                self.rollback(&jwt, previous);
                return Err(e);
            }
        };

        let session = Session::new(jwt.clone(), profile.role, profile.address.clone());
        if let Err(e) = self.state.commit(&jwt, session) {
            self.rollback(&jwt, previous);
            return Err(e);
        }
        tracing::info!("Signed in {} as {}", profile.address, profile.role);

        if options.clear_preview {
            if let Err(e) = self.preview.exit() {
                tracing::warn!("Failed to clear preview identity: {}", e);
            }
        }

        if options.notify {
            self.state.emit(AuthEvent::SignedIn {
                address: profile.address.clone(),
                role: profile.role,
            });
        }

        let redirect = options.redirect.then(|| self.state.routes.home_for(profile.role).to_string());
        if let Some(path) = &redirect {
            self.state.emit(AuthEvent::Redirect { path: path.clone() });
        }

        Ok(SignInOutcome { profile, redirect })
    }

    // Put back the pre-attempt state unless something else (a 401 logout)
    // already replaced the token this attempt installed.
    fn rollback(&self, attempted: &str, previous: SessionSlot) {
        self.state.write(|slot| {
            if slot.token.as_deref() == Some(attempted) {
                *slot = previous;
            }
        });
        tracing::warn!("Sign-in rolled back");
    }

    pub async fn logout(&self, reason: Option<&str>, redirect: bool) {
        self.state.logout(reason, redirect);
    }

    /// Re-read the profile for the current token and persist the result.
    /// Fails with [`ClientError::SessionChanged`] if the token was replaced
    /// or cleared while the profile was being fetched.
    pub async fn refresh_profile(&self) -> Result<MeResponse> {
        let token = self.state.read().token;
        let profile = self.api.me().await?;

        if let Some(token) = token {
            let session = Session::new(token.clone(), profile.role, profile.address.clone());
            self.state.commit(&token, session)?;
        }
        tracing::debug!("Profile refreshed: {} ({})", profile.address, profile.role);
        Ok(profile)
    }

    pub async fn connect_wallet(&self, wallet_id: &str) -> Result<WalletAccount> {
        self.wallets.connect(wallet_id).await
    }

    /// Disconnecting the wallet always ends the session.
    pub async fn disconnect_wallet(&self) -> Result<()> {
        let disconnected = self.wallets.disconnect().await;
        self.state.logout(Some(WALLET_DISCONNECTED_MESSAGE), true);
        disconnected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use crate::wallet::{LocalWallet, SignedData, WalletConnector, LOCAL_WALLET_ID};
    use async_trait::async_trait;
    use common::{PreviewIdentity, Role, VerifyRequest};
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};
    use std::sync::OnceLock;
    use std::time::Duration;
    use tokio::sync::broadcast::error::TryRecvError;

    struct Harness {
        transport: Arc<ScriptedTransport>,
        store: SessionStore,
        wallet: Arc<LocalWallet>,
        auth: AuthController,
    }

    fn harness(transport: ScriptedTransport) -> Harness {
        harness_with(transport, SessionStore::in_memory(), None)
    }

    fn harness_with(
        transport: ScriptedTransport,
        store: SessionStore,
        connector: Option<Arc<dyn WalletConnector>>,
    ) -> Harness {
        let transport = Arc::new(transport);
        let state = Arc::new(SessionState::new(
            store.clone(),
            RouteConfig::default(),
            UnauthorizedLimiter::default(),
        ));
        let api = ApiClient::new("http://bff.test", transport.clone(), state.clone())
            .unwrap()
            .with_unauthorized_handler(state.clone());

        let wallet = Arc::new(LocalWallet::from_secret_bytes(&[7u8; 32]));
        let connectors: Vec<Arc<dyn WalletConnector>> = match connector {
            Some(connector) => vec![connector],
            None => vec![wallet.clone()],
        };
        let wallets = Arc::new(WalletSession::new(connectors));
        let preview = Arc::new(PreviewController::new(store.clone()));

        Harness {
            transport,
            store,
            wallet,
            auth: AuthController::new(state, api, wallets, preview),
        }
    }

    fn drain(rx: &mut broadcast::Receiver<AuthEvent>) -> Vec<AuthEvent> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return events,
                Err(TryRecvError::Lagged(_)) => continue,
            }
        }
    }

    fn logouts(events: &[AuthEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, AuthEvent::LoggedOut { .. }))
            .count()
    }

    #[tokio::test]
    async fn test_sign_in_end_to_end() {
        let h = harness(ScriptedTransport::with_responder(|req| {
            let address = LocalWallet::from_secret_bytes(&[7u8; 32]).address().to_string();
            if req.url.ends_with("/auth/nonce") {
                (200, r#"{"nonce":"abc123"}"#.to_string())
            } else if req.url.ends_with("/auth/verify") {
                (200, r#"{"jwt":"tok1"}"#.to_string())
            } else if req.url.ends_with("/me") {
                assert_eq!(req.header("authorization"), Some("Bearer tok1"));
                (200, format!(r#"{{"address":"{}","role":"faculty"}}"#, address))
            } else {
                (404, String::new())
            }
        }));
        let mut events = h.auth.subscribe();
        h.store.save_preview(Role::Admin).unwrap();

        h.auth.connect_wallet(LOCAL_WALLET_ID).await.unwrap();
        let outcome = h.auth.sign_in(SignInOptions::default()).await.unwrap();

        assert_eq!(outcome.profile.role, Role::Faculty);
        assert_eq!(outcome.redirect.as_deref(), Some("/faculty/dashboard"));
        assert_eq!(h.auth.phase(), AuthPhase::Authenticated);
        assert_eq!(
            h.store.load_session(),
            Some(Session::new("tok1", Role::Faculty, h.wallet.address()))
        );
        assert!(!h.store.load_preview().enabled);

        // the verify call carried a signature over the canonical message
        let verify = h
            .transport
            .requests()
            .into_iter()
            .find(|r| r.url.ends_with("/auth/verify"))
            .unwrap();
        let body: VerifyRequest = match verify.body {
            crate::api::Body::Json(value) => serde_json::from_value(value).unwrap(),
            other => panic!("unexpected body: {:?}", other),
        };
        assert_eq!(body.nonce, "abc123");
        let key = VerifyingKey::from_bytes(&h.wallet.public_key()).unwrap();
        let signature = Signature::from_slice(&base64::decode(&body.signature).unwrap()).unwrap();
        assert!(key.verify(b"AlgoCampus auth nonce: abc123", &signature).is_ok());

        assert_eq!(
            drain(&mut events),
            vec![
                AuthEvent::SignedIn {
                    address: h.wallet.address().to_string(),
                    role: Role::Faculty
                },
                AuthEvent::Redirect {
                    path: "/faculty/dashboard".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_sign_in_profile_failure_persists_nothing() {
        let transport = ScriptedTransport::new();
        transport.push(200, r#"{"nonce":"n1"}"#);
        transport.push(200, r#"{"jwt":"tok1"}"#);
        transport.push(500, r#"{"detail":"profile lookup failed"}"#);
        let h = harness(transport);

        h.auth.connect_wallet(LOCAL_WALLET_ID).await.unwrap();
        let err = h.auth.sign_in(SignInOptions::default()).await.unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert_eq!(h.store.load_session(), None);
        assert!(!h.auth.is_authenticated());
        assert_eq!(h.auth.state().token(), None);
    }

    #[tokio::test]
    async fn test_sign_in_requires_connected_wallet() {
        let h = harness(ScriptedTransport::new());
        let err = h.auth.sign_in(SignInOptions::default()).await.unwrap_err();
        assert!(matches!(err, ClientError::WalletNotConnected));
        assert_eq!(err.to_string(), "Connect wallet first");
        assert!(h.transport.requests().is_empty());
    }

    struct RefusingWallet;

    #[async_trait]
    impl WalletConnector for RefusingWallet {
        fn id(&self) -> &str {
            "refusing"
        }

        fn name(&self) -> &str {
            "Refusing"
        }

        async fn connect(&self) -> Result<Vec<WalletAccount>> {
            Ok(vec![WalletAccount {
                name: "acct".into(),
                address: LocalWallet::from_secret_bytes(&[1u8; 32]).address().to_string(),
            }])
        }

        async fn disconnect(&self) -> Result<()> {
            Ok(())
        }

        async fn sign_data(&self, _address: &str, _data: &[u8], _scope: SignScope) -> Result<SignedData> {
            Err(ClientError::Signing("User rejected".into()))
        }
    }

    #[tokio::test]
    async fn test_signing_failure_is_wrapped() {
        let transport = ScriptedTransport::new();
        transport.push(200, r#"{"nonce":"n1"}"#);
        let h = harness_with(transport, SessionStore::in_memory(), Some(Arc::new(RefusingWallet)));

        h.auth.connect_wallet("refusing").await.unwrap();
        let err = h.auth.sign_in(SignInOptions::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "Message signing failed: User rejected");
        assert_eq!(h.transport.count_path("/auth/verify"), 0);
    }

    #[tokio::test]
    async fn test_concurrent_sign_in_is_rejected() {
        let h = harness(ScriptedTransport::new());
        let flag = InFlight::acquire(&h.auth.signing_in).unwrap();

        let err = h.auth.sign_in(SignInOptions::default()).await.unwrap_err();
        assert!(matches!(err, ClientError::SignInInProgress));

        drop(flag);
        let err = h.auth.sign_in(SignInOptions::default()).await.unwrap_err();
        assert!(matches!(err, ClientError::WalletNotConnected));
    }

    #[tokio::test]
    async fn test_bootstrap_without_session_is_anonymous() {
        let h = harness(ScriptedTransport::new());
        assert_eq!(h.auth.phase(), AuthPhase::Unknown);
        assert_eq!(h.auth.bootstrap().await, AuthPhase::Anonymous);
        assert!(h.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_bootstrap_refreshes_stored_session() {
        let store = SessionStore::in_memory();
        store.save_session(&Session::new("tok1", Role::Student, "OLD")).unwrap();
        let transport = ScriptedTransport::new();
        transport.push(200, r#"{"address":"NEW","role":"admin"}"#);
        let h = harness_with(transport, store, None);

        assert_eq!(h.auth.bootstrap().await, AuthPhase::Authenticated);
        assert_eq!(h.auth.session(), Some(Session::new("tok1", Role::Admin, "NEW")));
        assert_eq!(h.store.load_session(), Some(Session::new("tok1", Role::Admin, "NEW")));
    }

    #[tokio::test]
    async fn test_bootstrap_failure_logs_out_silently() {
        let store = SessionStore::in_memory();
        store.save_session(&Session::new("stale", Role::Student, "ADDR")).unwrap();
        let transport = ScriptedTransport::new();
        transport.push(401, r#"{"detail":"token expired"}"#);
        let h = harness_with(transport, store, None);
        let mut events = h.auth.subscribe();

        assert_eq!(h.auth.bootstrap().await, AuthPhase::Anonymous);
        assert_eq!(h.store.load_session(), None);
        assert_eq!(drain(&mut events), vec![AuthEvent::LoggedOut { reason: None }]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthorized_burst_logs_out_once() {
        let h = harness(ScriptedTransport::with_responder(|_| {
            (401, r#"{"detail":"invalid token"}"#.to_string())
        }));
        h.store.save_session(&Session::new("tok1", Role::Student, "ADDR")).unwrap();
        let mut events = h.auth.subscribe();

        assert!(h.auth.api().me().await.is_err());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(h.auth.api().me().await.is_err());

        let seen = drain(&mut events);
        assert_eq!(logouts(&seen), 1);
        assert_eq!(
            seen,
            vec![
                AuthEvent::LoggedOut {
                    reason: Some(SESSION_EXPIRED_MESSAGE.into())
                },
                AuthEvent::Redirect { path: "/connect".into() },
            ]
        );
        assert_eq!(h.store.load_session(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthorized_signals_apart_log_out_twice() {
        let h = harness(ScriptedTransport::new());
        let mut events = h.auth.subscribe();

        h.auth.state().on_unauthorized();
        tokio::time::advance(Duration::from_secs(3)).await;
        h.auth.state().on_unauthorized();

        assert_eq!(logouts(&drain(&mut events)), 2);
    }

    #[tokio::test]
    async fn test_disconnect_wallet_logs_out() {
        let store = SessionStore::in_memory();
        store.save_session(&Session::new("tok1", Role::Faculty, "ADDR")).unwrap();
        let transport = ScriptedTransport::new();
        transport.push(200, r#"{"address":"ADDR","role":"faculty"}"#);
        let h = harness_with(transport, store, None);
        h.auth.bootstrap().await;
        h.auth.connect_wallet(LOCAL_WALLET_ID).await.unwrap();
        let mut events = h.auth.subscribe();

        h.auth.disconnect_wallet().await.unwrap();

        assert!(!h.auth.wallets().is_connected());
        assert_eq!(h.auth.phase(), AuthPhase::Anonymous);
        assert_eq!(h.store.load_session(), None);
        assert_eq!(
            drain(&mut events)[0],
            AuthEvent::LoggedOut {
                reason: Some("Wallet disconnected".into())
            }
        );
    }

    fn wallet_address() -> String {
        LocalWallet::from_secret_bytes(&[7u8; 32]).address().to_string()
    }

    #[tokio::test]
    async fn test_logout_during_profile_fetch_is_not_overwritten() {
        let state_cell: Arc<OnceLock<Arc<SessionState>>> = Arc::default();
        let cell = state_cell.clone();
        let h = harness(ScriptedTransport::with_responder(move |req| {
            if req.url.ends_with("/auth/nonce") {
                (200, r#"{"nonce":"abc123"}"#.to_string())
            } else if req.url.ends_with("/auth/verify") {
                (200, r#"{"jwt":"tok1"}"#.to_string())
            } else if req.url.ends_with("/me") {
                // the user logs out while the profile is on its way back
                if let Some(state) = cell.get() {
                    state.logout(Some("user logout"), true);
                }
                (200, format!(r#"{{"address":"{}","role":"faculty"}}"#, wallet_address()))
            } else {
                (404, String::new())
            }
        }));
        assert!(state_cell.set(h.auth.state().clone()).is_ok());

        h.auth.connect_wallet(LOCAL_WALLET_ID).await.unwrap();
        let mut events = h.auth.subscribe();
        let err = h.auth.sign_in(SignInOptions::default()).await.unwrap_err();

        assert!(matches!(err, ClientError::SessionChanged));
        assert!(!h.auth.is_authenticated());
        assert_eq!(h.auth.phase(), AuthPhase::Anonymous);
        assert_eq!(h.auth.state().token(), None);
        assert_eq!(h.store.load_session(), None);
        assert_eq!(
            drain(&mut events),
            vec![
                AuthEvent::LoggedOut {
                    reason: Some("user logout".into())
                },
                AuthEvent::Redirect { path: "/connect".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_sign_in_options_can_skip_side_effects() {
        let transport = ScriptedTransport::new();
        transport.push(200, r#"{"nonce":"n1"}"#);
        transport.push(200, r#"{"jwt":"tok1"}"#);
        transport.push(200, &format!(r#"{{"address":"{}","role":"admin"}}"#, wallet_address()));
        let h = harness(transport);
        h.store.save_preview(Role::Student).unwrap();

        h.auth.connect_wallet(LOCAL_WALLET_ID).await.unwrap();
        let mut events = h.auth.subscribe();
        let outcome = h
            .auth
            .sign_in(SignInOptions {
                redirect: false,
                clear_preview: false,
                notify: false,
            })
            .await
            .unwrap();

        assert_eq!(outcome.profile.role, Role::Admin);
        assert_eq!(outcome.redirect, None);
        assert_eq!(h.auth.phase(), AuthPhase::Authenticated);
        assert_eq!(h.store.load_session().map(|s| s.token), Some("tok1".to_string()));
        assert_eq!(h.store.load_preview(), PreviewIdentity::with_role(Role::Student));
        assert!(drain(&mut events).is_empty());
    }

    #[tokio::test]
    async fn test_failed_sign_in_restores_previous_session() {
        let store = SessionStore::in_memory();
        let previous = Session::new("tok0", Role::Student, wallet_address());
        store.save_session(&previous).unwrap();

        let transport = ScriptedTransport::new();
        transport.push(200, &format!(r#"{{"address":"{}","role":"student"}}"#, wallet_address()));
        transport.push(200, r#"{"nonce":"n1"}"#);
        transport.push(200, r#"{"jwt":"tok1"}"#);
        transport.push(502, r#"{"detail":"indexer unavailable"}"#);
        let h = harness_with(transport, store, None);

        assert_eq!(h.auth.bootstrap().await, AuthPhase::Authenticated);
        h.auth.connect_wallet(LOCAL_WALLET_ID).await.unwrap();
        let err = h.auth.sign_in(SignInOptions::default()).await.unwrap_err();

        assert_eq!(err.status(), Some(502));
        assert_eq!(err.to_string(), "indexer unavailable");
        assert_eq!(h.auth.phase(), AuthPhase::Authenticated);
        assert_eq!(h.auth.session(), Some(previous.clone()));
        assert_eq!(h.store.load_session(), Some(previous));
    }

    #[tokio::test]
    async fn test_refresh_after_logout_does_not_resurrect_session() {
        let store = SessionStore::in_memory();
        store.save_session(&Session::new("tok1", Role::Faculty, "ADDR")).unwrap();
        let state_cell: Arc<OnceLock<Arc<SessionState>>> = Arc::default();
        let cell = state_cell.clone();
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = calls.clone();
        let transport = ScriptedTransport::with_responder(move |_| {
            // second profile read races a logout
            if counter.fetch_add(1, Ordering::SeqCst) == 1 {
                if let Some(state) = cell.get() {
                    state.logout(None, false);
                }
            }
            (200, r#"{"address":"ADDR","role":"faculty"}"#.to_string())
        });
        let h = harness_with(transport, store, None);
        assert!(state_cell.set(h.auth.state().clone()).is_ok());

        assert_eq!(h.auth.bootstrap().await, AuthPhase::Authenticated);
        let err = h.auth.refresh_profile().await.unwrap_err();

        assert!(matches!(err, ClientError::SessionChanged));
        assert_eq!(h.auth.phase(), AuthPhase::Anonymous);
        assert_eq!(h.store.load_session(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
