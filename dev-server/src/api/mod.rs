// dev-server/src/api/mod.rs
pub mod auth;
pub mod health;
pub mod tx;

use actix_web::{web, HttpRequest};
use common::{validate_jwt_token, Role};

use crate::error::DevServerError;
use crate::utils::token::bearer_token;
use crate::AppState;

/// Caller identity taken from a valid bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub address: String,
    pub role: Role,
}

pub fn authenticate(req: &HttpRequest, state: &AppState) -> Result<Caller, DevServerError> {
    let token = req
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| DevServerError::Unauthorized("Not authenticated".to_string()))?;

    let (address, role) = validate_jwt_token(token, state.jwt_secret()).map_err(|e| {
        tracing::debug!("Rejected bearer token: {}", e);
        DevServerError::Unauthorized("invalid token".to_string())
    })?;

    Ok(Caller { address, role })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(auth::request_nonce)
            .service(auth::verify)
            .service(auth::me),
    )
    .service(web::resource("/me").route(web::get().to(auth::me_alias)))
    .service(
        web::scope("/tx")
            .service(tx::track)
            .service(tx::get_status),
    )
    .service(health::health)
    .service(health::system_health);
}
