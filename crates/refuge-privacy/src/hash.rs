//! One-way hashing and anonymous identifier generation.
//!
//! Everything here is irreversible by construction: sensitive values
//! are hashed before storage, and anonymization re-hashes the stored
//! hash, never the original.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

/// SHA-256 of the input, hex-encoded (64 chars).
pub fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

/// Cryptographically random base64url string from `n` bytes, no
/// padding.
pub fn random_token(n: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..n).map(|_| rand::Rng::random(&mut rng)).collect();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Fresh anonymous identifier, e.g. `attendance_Qx3k9f2a1cL0mN4p`.
pub fn anonymous_label(prefix: &str) -> String {
    format!("{}_{}", prefix, random_token(16))
}

/// Fresh anonymous display name, e.g. `Anonymous_Qx3k9f2a`.
pub fn anonymous_display_name() -> String {
    let token = random_token(16);
    format!("Anonymous_{}", &token[..8])
}
