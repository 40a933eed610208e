// common/src/address.rs
//! Algorand account addresses: base32 (no padding) of the 32-byte Ed25519
//! public key followed by the last 4 bytes of its SHA-512/256 digest.

use data_encoding::BASE32_NOPAD;
use sha2::{Digest, Sha512_256};
use thiserror::Error;

pub const ADDRESS_LEN: usize = 58;
const PUBLIC_KEY_LEN: usize = 32;
const CHECKSUM_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address must be 58 characters, got {0}")]
    Length(usize),
    #[error("address is not valid base32")]
    Encoding,
    #[error("address checksum mismatch")]
    Checksum,
}

fn checksum(public_key: &[u8; PUBLIC_KEY_LEN]) -> [u8; CHECKSUM_LEN] {
    let digest = Sha512_256::digest(public_key);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[digest.len() - CHECKSUM_LEN..]);
    out
}

/// Encode a public key as an Algorand address.
pub fn encode_address(public_key: &[u8; PUBLIC_KEY_LEN]) -> String {
    let mut raw = Vec::with_capacity(PUBLIC_KEY_LEN + CHECKSUM_LEN);
    raw.extend_from_slice(public_key);
    raw.extend_from_slice(&checksum(public_key));
    BASE32_NOPAD.encode(&raw)
}

/// Decode an address back into its public key, verifying length and checksum.
pub fn decode_address(address: &str) -> Result<[u8; PUBLIC_KEY_LEN], AddressError> {
    if address.len() != ADDRESS_LEN {
        return Err(AddressError::Length(address.len()));
    }

    let raw = BASE32_NOPAD
        .decode(address.as_bytes())
        .map_err(|_| AddressError::Encoding)?;
    if raw.len() != PUBLIC_KEY_LEN + CHECKSUM_LEN {
        return Err(AddressError::Encoding);
    }

    let mut public_key = [0u8; PUBLIC_KEY_LEN];
    public_key.copy_from_slice(&raw[..PUBLIC_KEY_LEN]);
    if raw[PUBLIC_KEY_LEN..] != checksum(&public_key) {
        return Err(AddressError::Checksum);
    }

    Ok(public_key)
}

pub fn is_valid_address(address: &str) -> bool {
    decode_address(address).is_ok()
}
