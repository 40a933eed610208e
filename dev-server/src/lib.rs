// dev-server/src/lib.rs
pub mod api;
pub mod error;
pub mod middleware;
pub mod registry;
pub mod utils;

use actix::{Actor, Addr};
use chrono::{DateTime, Utc};
use common::DevServerConfig;

use crate::registry::CampusRegistry;

pub use api::configure;
pub use error::DevServerError;
pub use middleware::RateLimiter;

/// Shared handler state, registered once as `web::Data<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub registry: Addr<CampusRegistry>,
    pub config: DevServerConfig,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Start the registry actor; must run inside an actix system.
    pub fn start(config: DevServerConfig) -> Self {
        let registry = CampusRegistry::new(config.roles.clone(), config.confirm_after_polls)
            .with_nonce_ttl(config.nonce_ttl_secs)
            .with_failing_prefix(config.failing_tx_prefix.clone())
            .start();
        Self {
            registry,
            config,
            started_at: Utc::now(),
        }
    }

    pub fn jwt_secret(&self) -> &[u8] {
        self.config.jwt_secret.as_bytes()
    }

    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(
            vec!["/auth/".to_string()],
            self.config.rate_limit_capacity,
            self.config.rate_limit_refill_per_sec,
        )
    }
}
