// client/src/api/endpoints.rs
pub const AUTH_NONCE: &str = "/auth/nonce";
pub const AUTH_VERIFY: &str = "/auth/verify";
pub const ME: &str = "/me";
pub const TX_TRACK: &str = "/tx/track";
pub const HEALTH: &str = "/health";
pub const SYSTEM_HEALTH: &str = "/system/health";

pub fn tx_status(tx_id: &str) -> String {
    format!("{}/{}", TX_TRACK, tx_id)
}
