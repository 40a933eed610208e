// dev-server/src/utils/token.rs
use rand::{thread_rng, RngCore};

const NONCE_BYTES: usize = 16;

/// Random challenge nonce: 16 bytes, hex encoded
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Pull the credential out of an `Authorization: Bearer <token>` value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
