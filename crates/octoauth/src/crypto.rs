//! Symmetric encryption-at-rest for sensitive session and credential
//! fields, and password/secret hashing.
//!
//! # Encryption
//!
//! AES-256-CBC with a key derived as `SHA-256(key_material)`. The stored
//! shape is `"encrypted:" + base64(iv || ciphertext)`, where `iv` is taken
//! to be the first 16 bytes of the raw input itself rather than a randomly
//! generated value. This makes `encrypt` deterministic: encrypting the same
//! plaintext under the same key always yields the same stored value, which
//! is what lets callers re-encrypt a query value and look it up by exact
//! match against an encrypted field. Values without the `encrypted:` prefix
//! are treated as legacy unencrypted data (see [`is_legacy_plaintext`]).
//!
//! # Password hashing
//!
//! Argon2id via the same crate and defaults the app-secret hashing in the
//! original auth module used.

use aes::Aes256;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use sha2::{Digest, Sha256};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const MARKER: &str = "encrypted:";
const IV_LEN: usize = 16;

/// A value stored in a sensitive field is assumed to be legacy plaintext
/// if it is shorter than this many bytes and lacks the `encrypted:` marker.
const LEGACY_MIN_LEN: usize = 48;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("ciphertext is too short to contain an IV")]
    Truncated,
    #[error("invalid base64 in encrypted value")]
    InvalidEncoding,
    #[error("decryption failed: padding or key mismatch")]
    DecryptionFailed,
    #[error("plaintext is shorter than the {IV_LEN}-byte IV prefix")]
    PlaintextTooShort,
}

/// Derives the AES-256 key from arbitrary key material (the configured
/// `[session] aes_key`).
fn derive_key(key_material: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(key_material.as_bytes());
    hasher.finalize().into()
}

/// Encrypts `plaintext` under `key_material`, returning the `encrypted:`-
/// prefixed, base64-encoded `iv || ciphertext` value.
///
/// The IV is the first [`IV_LEN`] bytes of `plaintext` itself, carried
/// through unencrypted; only the remainder is fed to AES-CBC. This makes
/// the result a pure function of `(key_material, plaintext)`, so a caller
/// that re-encrypts a value before querying storage gets back exactly what
/// was stored for it.
pub fn encrypt(key_material: &str, plaintext: &str) -> Result<String, CryptoError> {
    use base64::Engine;

    let bytes = plaintext.as_bytes();
    if bytes.len() < IV_LEN {
        return Err(CryptoError::PlaintextTooShort);
    }
    let (iv, rest) = bytes.split_at(IV_LEN);

    let key = derive_key(key_material);
    let ciphertext = Aes256CbcEnc::new(&key.into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(rest);

    let mut payload = Vec::with_capacity(IV_LEN + ciphertext.len());
    payload.extend_from_slice(iv);
    payload.extend_from_slice(&ciphertext);

    Ok(format!("{MARKER}{}", base64::engine::general_purpose::STANDARD.encode(payload)))
}

/// Decrypts a value previously produced by [`encrypt`], reconstructing the
/// original `iv + plaintext_rest` byte string. If `value` has no
/// `encrypted:` marker it is returned unchanged as legacy plaintext (see
/// [`is_legacy_plaintext`] for the logging hook callers should use).
pub fn decrypt(key_material: &str, value: &str) -> Result<String, CryptoError> {
    use base64::Engine;

    let Some(encoded) = value.strip_prefix(MARKER) else {
        return Ok(value.to_string());
    };

    let payload = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| CryptoError::InvalidEncoding)?;

    if payload.len() < IV_LEN {
        return Err(CryptoError::Truncated);
    }
    let (iv, ciphertext) = payload.split_at(IV_LEN);

    let key = derive_key(key_material);
    let rest = Aes256CbcDec::new(&key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)?;

    let mut plaintext = Vec::with_capacity(IV_LEN + rest.len());
    plaintext.extend_from_slice(iv);
    plaintext.extend_from_slice(&rest);
    String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed)
}

/// `true` if `value` would be treated as an unencrypted legacy value on
/// read (no `encrypted:` marker, and shorter than the design's minimum
/// ciphertext length). Callers should log at `warn` when this is `true`
/// for a field declared sensitive.
#[must_use]
pub fn is_legacy_plaintext(value: &str) -> bool {
    !value.starts_with(MARKER) && value.len() < LEGACY_MIN_LEN
}

/// Hashes a password or client secret for storage using Argon2id.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verifies a password or client secret against a stored Argon2 hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed = PasswordHash::new(hash)?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let key = "super-secret-key-material";
        let plaintext = "s3cr3t-session-token-value";
        let ciphertext = encrypt(key, plaintext).unwrap();
        assert!(ciphertext.starts_with("encrypted:"));
        assert_eq!(decrypt(key, &ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn encrypting_twice_yields_identical_ciphertext() {
        let key = "k";
        let a = encrypt(key, "value-long-enough").unwrap();
        let b = encrypt(key, "value-long-enough").unwrap();
        assert_eq!(a, b, "encryption must be deterministic so lookups by encrypted field work");
    }

    #[test]
    fn encrypting_distinct_values_yields_distinct_ciphertext() {
        let key = "k";
        let a = encrypt(key, "value-one-longer").unwrap();
        let b = encrypt(key, "value-two-longer").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn plaintext_shorter_than_iv_is_rejected() {
        assert!(matches!(encrypt("k", "short"), Err(CryptoError::PlaintextTooShort)));
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let ciphertext = encrypt("key-one", "value-long-enough").unwrap();
        assert!(decrypt("key-two", &ciphertext).is_err());
    }

    #[test]
    fn unmarked_value_passes_through_as_legacy() {
        assert_eq!(decrypt("any-key", "plain-old-value").unwrap(), "plain-old-value");
    }

    #[test]
    fn legacy_plaintext_detection_uses_length_and_marker() {
        assert!(is_legacy_plaintext("short-token"));
        assert!(!is_legacy_plaintext(&encrypt("k", "value-long-enough").unwrap()));
        let long_but_unmarked = "x".repeat(64);
        assert!(!is_legacy_plaintext(&long_but_unmarked));
    }

    #[test]
    fn password_hash_round_trips_and_rejects_wrong_password() {
        let hash = hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter2", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }
}
