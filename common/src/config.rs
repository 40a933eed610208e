// common/src/config.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use config::{Config as ConfigFile, File, Environment};

use crate::models::Role;

/// Central configuration for the client and the dev server
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub client: ClientConfig,
    pub tracker: TrackerConfig,
    pub routes: RouteConfig,
    pub dev_server: DevServerConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the BFF
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    /// JSON file backing the persistent session store
    pub session_store_path: String,
    /// Hex key file of the local development wallet
    pub wallet_key_path: String,
    /// Window within which repeated 401s collapse into one logout
    pub unauthorized_debounce_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

/// Where each role lands after sign-in, and where logout sends the user.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    pub sign_in: String,
    pub student_home: String,
    pub faculty_home: String,
    pub admin_home: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DevServerConfig {
    pub addr: String,
    pub jwt_secret: String,
    pub jwt_expire_minutes: u64,
    /// Status reads before a tracked transaction reports confirmed
    pub confirm_after_polls: u32,
    pub rate_limit_capacity: f64,
    pub rate_limit_refill_per_sec: f64,
    /// Seconds an unused sign-in challenge stays valid
    pub nonce_ttl_secs: i64,
    /// Tracked ids starting with this report failed instead of confirmed
    pub failing_tx_prefix: String,
    /// Role assignments by address; everyone else signs in as student
    pub roles: HashMap<String, Role>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            client: ClientConfig::default(),
            tracker: TrackerConfig::default(),
            routes: RouteConfig::default(),
            dev_server: DevServerConfig::default(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".to_string(),
            request_timeout_secs: 15,
            session_store_path: ".data/session.json".to_string(),
            wallet_key_path: ".data/wallet.json".to_string(),
            unauthorized_debounce_ms: 2500,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            max_attempts: 20,
        }
    }
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            sign_in: "/connect".to_string(),
            student_home: "/student/dashboard".to_string(),
            faculty_home: "/faculty/dashboard".to_string(),
            admin_home: "/admin/dashboard".to_string(),
        }
    }
}

impl RouteConfig {
    pub fn home_for(&self, role: Role) -> &str {
        match role {
            Role::Admin => &self.admin_home,
            Role::Faculty => &self.faculty_home,
            Role::Student => &self.student_home,
        }
    }
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8000".to_string(),
            jwt_secret: "algocampus-local-dev-secret-change-in-production".to_string(),
            jwt_expire_minutes: 60,
            confirm_after_polls: 2,
            rate_limit_capacity: 20.0,
            rate_limit_refill_per_sec: 2.0,
            nonce_ttl_secs: 300,
            failing_tx_prefix: "FAIL-".to_string(),
            roles: HashMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        // Locate the config directory
        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        let config = ConfigFile::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            // Local overrides, never committed
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Environment variables with prefix "APP", e.g. APP__CLIENT__API_BASE_URL
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load from files, falling back to plain environment variables
    pub fn from_env() -> Self {
        match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            },
            Err(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                tracing::info!("Falling back to environment variables only");

                let mut config = Self::default();

                if let Ok(level) = env::var("LOG_LEVEL") {
                    config.log_level = level;
                }
                if let Ok(url) = env::var("BFF_BASE_URL") {
                    config.client.api_base_url = url;
                }
                if let Ok(path) = env::var("SESSION_STORE_PATH") {
                    config.client.session_store_path = path;
                }
                if let Ok(path) = env::var("WALLET_KEY_PATH") {
                    config.client.wallet_key_path = path;
                }
                if let Some(attempts) = env::var("TX_TRACK_MAX_ATTEMPTS")
                    .ok()
                    .and_then(|v| v.parse::<u32>().ok())
                {
                    config.tracker.max_attempts = attempts;
                }
                if let Some(interval) = env::var("TX_TRACK_INTERVAL_MS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                {
                    config.tracker.interval_ms = interval;
                }
                if let Ok(addr) = env::var("DEV_SERVER_ADDR") {
                    config.dev_server.addr = addr;
                }
                if let Ok(secret) = env::var("JWT_SECRET") {
                    config.dev_server.jwt_secret = secret;
                }

                config
            }
        }
    }
}
