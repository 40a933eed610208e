// client/src/api/mod.rs
//! Thin request layer over the BFF: bearer auth, body encoding, tolerant
//! response decoding and the 401 contract the session controller relies on.

pub mod endpoints;
pub mod transport;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use common::{
    ClientConfig, HealthResponse, MeResponse, NonceRequest, NonceResponse, SystemHealthResponse,
    TrackTxRequest, TxStatusResponse, VerifyRequest, VerifyResponse,
};

use crate::error::{ApiError, ClientError, Result};
pub use transport::{Body, FormPart, HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport};

/// Message returned for any 401 on an authenticated call. The server's own
/// detail is never echoed.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please sign in again.";

/// Read access to the current bearer token.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

/// Notified when an authenticated call comes back 401.
pub trait UnauthorizedHandler: Send + Sync {
    fn on_unauthorized(&self);
}

impl<F> UnauthorizedHandler for F
where
    F: Fn() + Send + Sync,
{
    fn on_unauthorized(&self) {
        self()
    }
}

#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Body,
    /// Attach the bearer token and apply the 401 contract
    pub auth: bool,
    pub headers: Vec<(String, String)>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::Get,
            body: Body::Empty,
            auth: true,
            headers: Vec::new(),
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post() -> Self {
        Self {
            method: Method::Post,
            ..Self::default()
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self> {
        self.body = Body::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn multipart(mut self, parts: Vec<FormPart>) -> Self {
        self.body = Body::Multipart(parts);
        self
    }

    pub fn unauthenticated(mut self) -> Self {
        self.auth = false;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Outcome of probing backend health.
#[derive(Debug, Clone, PartialEq)]
pub enum HealthReport {
    System(SystemHealthResponse),
    /// `/system/health` is not served; only liveness is known
    Basic(HealthResponse),
}

/// Decode a response body: empty is `null`, JSON if it parses, raw text otherwise.
pub fn parse_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

fn error_message(payload: &Value, status_text: &str) -> String {
    let message = match payload {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Object(map) => match map.get("detail") {
            Some(Value::String(detail)) => detail.clone(),
            Some(detail) => detail.to_string(),
            None => payload.to_string(),
        },
        other => other.to_string(),
    };

    if message.is_empty() {
        status_text.to_string()
    } else {
        message
    }
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<dyn TokenProvider>,
    unauthorized: Option<Arc<dyn UnauthorizedHandler>>,
}

impl ApiClient {
    pub fn new(base_url: &str, transport: Arc<dyn HttpTransport>, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let parsed = Url::parse(base_url).map_err(|e| ClientError::Config(format!("invalid base url {}: {}", base_url, e)))?;
        if parsed.cannot_be_a_base() {
            return Err(ClientError::Config(format!("invalid base url {}", base_url)));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
            tokens,
            unauthorized: None,
        })
    }

    /// Client over the reqwest transport, configured from `[client]`.
    pub fn from_config(config: &ClientConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let transport = ReqwestTransport::new(Duration::from_secs(config.request_timeout_secs))?;
        Self::new(&config.api_base_url, Arc::new(transport), tokens)
    }

    pub fn with_unauthorized_handler(mut self, handler: Arc<dyn UnauthorizedHandler>) -> Self {
        self.unauthorized = Some(handler);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn request<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> Result<T> {
        let value = self.request_value(path, options).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn request_value(&self, path: &str, options: RequestOptions) -> Result<Value> {
        let RequestOptions { method, body, auth, mut headers } = options;

        if auth {
            if let Some(token) = self.tokens.token() {
                headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
            }
        }

        let request = HttpRequest {
            method,
            url: format!("{}{}", self.base_url, path),
            headers,
            body,
        };

        tracing::debug!("API request: {:?} {} (auth: {})", method, path, auth);
        let response = self.transport.send(request).await?;
        tracing::debug!("API response: {:?} {} -> {}", method, path, response.status);

        let payload = parse_body(&response.body);

        if response.is_success() {
            return Ok(payload);
        }

        if response.status == 401 && auth {
            tracing::warn!("401 on authenticated call to {}", path);
            if let Some(handler) = &self.unauthorized {
                handler.on_unauthorized();
            }
            return Err(ApiError::new(401, SESSION_EXPIRED_MESSAGE, payload).into());
        }

        let message = error_message(&payload, &response.status_text);
        Err(ApiError::new(response.status, message, payload).into())
    }

    pub async fn request_nonce(&self, address: &str) -> Result<NonceResponse> {
        let body = NonceRequest {
            address: address.to_string(),
        };
        self.request(endpoints::AUTH_NONCE, RequestOptions::post().json(&body)?.unauthenticated())
            .await
    }

    pub async fn verify(&self, body: &VerifyRequest) -> Result<VerifyResponse> {
        self.request(endpoints::AUTH_VERIFY, RequestOptions::post().json(body)?.unauthenticated())
            .await
    }

    pub async fn me(&self) -> Result<MeResponse> {
        self.request(endpoints::ME, RequestOptions::get()).await
    }

    pub async fn register_tx(&self, body: &TrackTxRequest) -> Result<TxStatusResponse> {
        self.request(endpoints::TX_TRACK, RequestOptions::post().json(body)?).await
    }

    pub async fn tx_status(&self, tx_id: &str) -> Result<TxStatusResponse> {
        self.request(&endpoints::tx_status(tx_id), RequestOptions::get()).await
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.request(endpoints::HEALTH, RequestOptions::get().unauthenticated()).await
    }

    pub async fn system_health(&self) -> Result<SystemHealthResponse> {
        self.request(endpoints::SYSTEM_HEALTH, RequestOptions::get().unauthenticated())
            .await
    }

    /// Prefer the detailed readiness report, falling back to plain liveness
    /// on backends that do not serve it.
    pub async fn probe_health(&self) -> Result<HealthReport> {
        match self.system_health().await {
            Ok(report) => Ok(HealthReport::System(report)),
            Err(ClientError::Api(e)) if e.is_not_found() => {
                tracing::info!("{} not served, falling back to {}", endpoints::SYSTEM_HEALTH, endpoints::HEALTH);
                Ok(HealthReport::Basic(self.health().await?))
            }
            Err(e) => Err(e),
        }
    }
}
