// dev-server/src/api/auth.rs
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use common::{generate_jwt_token, is_valid_address, MeResponse, NonceRequest, NonceResponse, VerifyRequest, VerifyResponse};

use crate::api::authenticate;
use crate::error::DevServerError;
use crate::registry::{IssueNonce, VerifyChallenge};
use crate::AppState;

// Issue a fresh challenge for the address
#[post("/nonce")]
pub async fn request_nonce(
    body: web::Json<NonceRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, DevServerError> {
    let NonceRequest { address } = body.into_inner();
    if !is_valid_address(&address) {
        return Err(DevServerError::BadRequest("invalid address".to_string()));
    }

    let nonce = state.registry.send(IssueNonce { address }).await?;
    Ok(HttpResponse::Ok().json(NonceResponse { nonce }))
}

// Exchange a signed challenge for a token
#[post("/verify")]
pub async fn verify(
    body: web::Json<VerifyRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, DevServerError> {
    let VerifyRequest { address, nonce, signature } = body.into_inner();

    let role = state
        .registry
        .send(VerifyChallenge {
            address: address.clone(),
            nonce,
            signature,
        })
        .await?
        .map_err(|_| DevServerError::Unauthorized("verification failed".to_string()))?;

    let ttl = state.config.jwt_expire_minutes * 60;
    let jwt = generate_jwt_token(&address, role, state.jwt_secret(), ttl)?;

    tracing::info!("Issued token for {} ({})", address, role);
    Ok(HttpResponse::Ok().json(VerifyResponse { jwt }))
}

#[get("/me")]
pub async fn me(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, DevServerError> {
    me_alias(req, state).await
}

// Same profile under the top-level path the client uses
pub async fn me_alias(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, DevServerError> {
    let caller = authenticate(&req, &state)?;
    Ok(HttpResponse::Ok().json(MeResponse {
        address: caller.address,
        role: caller.role,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};
    use common::{auth_message, encode_address, DevServerConfig, ErrorPayload, Role};
    use ed25519_dalek::{Signer, SigningKey};
    use std::collections::HashMap;

    fn config(roles: HashMap<String, Role>) -> DevServerConfig {
        DevServerConfig {
            roles,
            ..DevServerConfig::default()
        }
    }

    #[actix_web::test]
    async fn test_nonce_verify_me_flow() {
        let key = SigningKey::from_bytes(&[3u8; 32]);
        let address = encode_address(key.verifying_key().as_bytes());
        let state = AppState::start(config(HashMap::from([(address.clone(), Role::Admin)])));
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(crate::configure)).await;

        let req = test::TestRequest::post()
            .uri("/auth/nonce")
            .set_json(NonceRequest { address: address.clone() })
            .to_request();
        let NonceResponse { nonce } = test::call_and_read_body_json(&app, req).await;

        let signature = base64::encode(key.sign(auth_message(&nonce).as_bytes()).to_bytes());
        let req = test::TestRequest::post()
            .uri("/auth/verify")
            .set_json(VerifyRequest {
                address: address.clone(),
                nonce,
                signature,
            })
            .to_request();
        let VerifyResponse { jwt } = test::call_and_read_body_json(&app, req).await;

        for path in ["/me", "/auth/me"] {
            let req = test::TestRequest::get()
                .uri(path)
                .insert_header(("Authorization", format!("Bearer {}", jwt)))
                .to_request();
            let profile: MeResponse = test::call_and_read_body_json(&app, req).await;
            assert_eq!(profile, MeResponse { address: address.clone(), role: Role::Admin });
        }
    }

    #[actix_web::test]
    async fn test_verify_without_challenge_is_401() {
        let key = SigningKey::from_bytes(&[4u8; 32]);
        let address = encode_address(key.verifying_key().as_bytes());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::start(config(HashMap::new()))))
                .configure(crate::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/auth/verify")
            .set_json(VerifyRequest {
                address,
                nonce: "abc".into(),
                signature: base64::encode(key.sign(b"AlgoCampus auth nonce: abc").to_bytes()),
            })
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: ErrorPayload = test::read_body_json(resp).await;
        assert_eq!(body.detail, "verification failed");
    }

    #[actix_web::test]
    async fn test_nonce_rejects_invalid_address_and_me_requires_token() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::start(config(HashMap::new()))))
                .configure(crate::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/auth/nonce")
            .set_json(NonceRequest { address: "not-an-address".into() })
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/me").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header(("Authorization", "Bearer garbage"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: ErrorPayload = test::read_body_json(resp).await;
        assert_eq!(body.detail, "invalid token");
    }
}
