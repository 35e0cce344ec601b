use http::HeaderName;
use sha2::{Digest, Sha256};

pub const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

/// Hex SHA-256 of a raw key. Only the hash is stored.
pub fn hash_api_key(raw: &str) -> String {
    format!("{:x}", Sha256::digest(raw.as_bytes()))
}
