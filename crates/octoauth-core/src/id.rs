//! Identifier generation for sessions, clients, and credentials.
//!
//! Every identifier minted here is a URL-safe random string, not a
//! sequential or guessable value - callers pick the byte length that suits
//! the identifier's purpose (see the constants below).

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

/// Byte length used for session and client identifiers.
pub const ID_BYTES: usize = 16;

/// Byte length used for client secrets and registration codes.
pub const SECRET_BYTES: usize = 32;

/// Generates a URL-safe random identifier of `len` bytes, base64url-encoded
/// without padding.
pub fn generate_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generates a session or client identifier (`ID_BYTES` bytes).
pub fn generate_id() -> String {
    generate_token(ID_BYTES)
}

/// Generates a client secret or registration code (`SECRET_BYTES` bytes).
pub fn generate_secret() -> String {
    generate_token(SECRET_BYTES)
}

/// Validates a caller-supplied (non-canonical) client id.
///
/// Canonical ids minted by `generate_id` always pass; this only rejects
/// identifiers a client explicitly asked to use.
pub fn is_valid_client_id(id: &str) -> bool {
    let len_ok = (8..=64).contains(&id.len());
    len_ok && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_unique_tokens() {
        let a = generate_token(16);
        let b = generate_token(16);
        assert_ne!(a, b);
        assert!(!a.contains('='));
    }

    #[test]
    fn id_and_secret_lengths_differ() {
        assert!(generate_id().len() < generate_secret().len());
    }

    #[test]
    fn validates_client_id_shape() {
        assert!(is_valid_client_id("my-client_123"));
        assert!(!is_valid_client_id("short"));
        assert!(!is_valid_client_id("has a space"));
        assert!(!is_valid_client_id(&"x".repeat(65)));
    }
}
