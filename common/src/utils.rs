// common/src/utils.rs
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::models::Role;

/// Setup tracing for consistent logging across the workspace binaries
pub fn setup_tracing(level: &str) {
    let level = Level::from_str(level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,  // wallet address
    pub role: Role,
    pub iat: usize,   // issued at time
    pub exp: usize,   // expiration time
}

// Issue an HS256 token binding a wallet address to a role
pub fn generate_jwt_token(
    address: &str,
    role: Role,
    secret: &[u8],
    ttl_seconds: u64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp().max(0) as usize;

    let claims = JwtClaims {
        sub: address.to_string(),
        role,
        iat: now,
        exp: now + ttl_seconds as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
}

// Validate a token and extract the wallet address and role
pub fn validate_jwt_token(token: &str, secret: &[u8]) -> Result<(String, Role), jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<JwtClaims>(token, &DecodingKey::from_secret(secret), &validation)?;

    if token_data.claims.sub.is_empty() {
        return Err(jsonwebtoken::errors::ErrorKind::InvalidSubject.into());
    }

    Ok((token_data.claims.sub, token_data.claims.role))
}
