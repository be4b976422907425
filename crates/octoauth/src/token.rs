//! Token verification for the Request Binding Middleware (spec §4.7).
//!
//! Tokens are minted by an external OIDC authorization server; this crate
//! only verifies signatures and decodes claims. Asymmetric key *generation*
//! (the teacher's `RS384`/`ES384` signing key pairs) has no counterpart
//! here and was dropped along with the `rsa`/`p384` dependencies.

use jsonwebtoken::{Algorithm, DecodingKey, TokenData, Validation, decode};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("malformed token: {message}")]
    Malformed { message: String },
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            _ => Self::Malformed { message: err.to_string() },
        }
    }
}

/// Claims common to both ID tokens and access tokens minted by the
/// upstream OIDC server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    /// The session this token was issued for (spec §4.7 binds a token to
    /// its session before RBAC is evaluated).
    pub session_id: String,
}

/// Verifies tokens signed by the upstream authorization server. Holds no
/// signing capability - only a decoding key and the expected issuer/audience.
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    #[must_use]
    pub fn new_hmac(secret: &[u8], issuer: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    #[must_use]
    pub fn new_rsa(public_key_pem: &[u8], issuer: &str, audience: &str) -> Result<Self, TokenError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        Ok(Self {
            decoding_key: DecodingKey::from_rsa_pem(public_key_pem)
                .map_err(|e| TokenError::Malformed { message: e.to_string() })?,
            validation,
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data: TokenData<Claims> = decode(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn sign(claims: &Claims, secret: &[u8]) -> String {
        encode(&Header::new(Algorithm::HS256), claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    fn claims(exp: i64) -> Claims {
        Claims {
            sub: "cred-1".to_string(),
            iss: "https://issuer.example.com".to_string(),
            aud: "octoauth".to_string(),
            exp,
            iat: 0,
            session_id: "session-1".to_string(),
        }
    }

    #[test]
    fn verifies_a_correctly_signed_token() {
        let secret = b"test-secret";
        let verifier = TokenVerifier::new_hmac(secret, "https://issuer.example.com", "octoauth");
        let token = sign(&claims(i64::MAX / 2), secret);
        let decoded = verifier.verify(&token).unwrap();
        assert_eq!(decoded.session_id, "session-1");
    }

    #[test]
    fn rejects_expired_token() {
        let secret = b"test-secret";
        let verifier = TokenVerifier::new_hmac(secret, "https://issuer.example.com", "octoauth");
        let token = sign(&claims(1), secret);
        let err = verifier.verify(&token).unwrap_err();
        assert!(matches!(err, TokenError::Expired));
    }

    #[test]
    fn rejects_token_signed_with_a_different_secret() {
        let verifier = TokenVerifier::new_hmac(b"right-secret", "https://issuer.example.com", "octoauth");
        let token = sign(&claims(i64::MAX / 2), b"wrong-secret");
        let err = verifier.verify(&token).unwrap_err();
        assert!(matches!(err, TokenError::InvalidSignature));
    }

    #[test]
    fn rejects_token_with_wrong_audience() {
        let secret = b"test-secret";
        let verifier = TokenVerifier::new_hmac(secret, "https://issuer.example.com", "someone-else");
        let token = sign(&claims(i64::MAX / 2), secret);
        assert!(verifier.verify(&token).is_err());
    }
}
