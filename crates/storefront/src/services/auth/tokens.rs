//! Access and refresh tokens.
//!
//! Both are HS256 JWTs carrying the user id and admin flag. They are signed
//! with different secrets and tagged with their kind, so a refresh token is
//! never accepted where an access token is expected (and vice versa).

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use vitrina_core::UserId;

use crate::config::TokenConfig;

/// Access tokens live for a day.
pub const ACCESS_TOKEN_TTL: Duration = Duration::hours(24);

/// Refresh tokens (and the refresh cookie) live for thirty days.
pub const REFRESH_TOKEN_TTL: Duration = Duration::days(30);

/// Token errors.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Encode(#[source] jsonwebtoken::errors::Error),

    #[error("token has expired")]
    Expired,

    #[error("token is invalid")]
    Invalid,
}

/// Which secret a token was signed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// The identity carried by a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPayload {
    pub id: UserId,
    pub is_admin: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Claims {
    #[serde(flatten)]
    payload: TokenPayload,
    kind: TokenKind,
    iat: i64,
    exp: i64,
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Clone)]
struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// Issues and verifies access and refresh tokens.
#[derive(Clone)]
pub struct TokenService {
    access: Keys,
    refresh: Keys,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService").finish_non_exhaustive()
    }
}

impl TokenService {
    #[must_use]
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            access: Keys::from_secret(config.access_secret.expose_secret().as_bytes()),
            refresh: Keys::from_secret(config.refresh_secret.expose_secret().as_bytes()),
        }
    }

    /// Issue an access and a refresh token for `payload`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encode` if signing fails.
    pub fn issue(&self, payload: TokenPayload) -> Result<TokenPair, TokenError> {
        self.issue_at(payload, Utc::now())
    }

    fn issue_at(&self, payload: TokenPayload, now: DateTime<Utc>) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: sign(&self.access, payload, TokenKind::Access, now, ACCESS_TOKEN_TTL)?,
            refresh: sign(&self.refresh, payload, TokenKind::Refresh, now, REFRESH_TOKEN_TTL)?,
        })
    }

    /// Verify an access token.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Expired` or `TokenError::Invalid`.
    pub fn verify_access(&self, token: &str) -> Result<TokenPayload, TokenError> {
        verify(&self.access, token, TokenKind::Access)
    }

    /// Verify a refresh token.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Expired` or `TokenError::Invalid`.
    pub fn verify_refresh(&self, token: &str) -> Result<TokenPayload, TokenError> {
        verify(&self.refresh, token, TokenKind::Refresh)
    }
}

fn sign(
    keys: &Keys,
    payload: TokenPayload,
    kind: TokenKind,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Result<String, TokenError> {
    let claims = Claims {
        payload,
        kind,
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };
    encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding).map_err(TokenError::Encode)
}

fn verify(keys: &Keys, token: &str, expected: TokenKind) -> Result<TokenPayload, TokenError> {
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(token, &keys.decoding, &validation).map_err(|e| {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        }
    })?;

    if data.claims.kind != expected {
        return Err(TokenError::Invalid);
    }
    Ok(data.claims.payload)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn service() -> TokenService {
        TokenService::new(&TokenConfig {
            access_secret: SecretString::from("a8Kq2vX9mN4pR7sT1wY6zB3cF5hJ0lE"),
            refresh_secret: SecretString::from("Zx7Qw3Er9Ty1Ui5Op8As2Df6Gh4Jk0Lm"),
        })
    }

    fn payload() -> TokenPayload {
        TokenPayload {
            id: UserId::new(42),
            is_admin: true,
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let tokens = service();
        let pair = tokens.issue(payload()).unwrap();
        assert_eq!(tokens.verify_access(&pair.access).unwrap(), payload());
        assert_eq!(tokens.verify_refresh(&pair.refresh).unwrap(), payload());
    }

    #[test]
    fn test_kinds_are_not_interchangeable() {
        let tokens = service();
        let pair = tokens.issue(payload()).unwrap();
        assert!(matches!(tokens.verify_access(&pair.refresh), Err(TokenError::Invalid)));
        assert!(matches!(tokens.verify_refresh(&pair.access), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_expired_access_token() {
        let tokens = service();
        let issued = Utc::now() - Duration::hours(25);
        let pair = tokens.issue_at(payload(), issued).unwrap();
        assert!(matches!(tokens.verify_access(&pair.access), Err(TokenError::Expired)));
        // The refresh token from the same pair is still valid.
        assert!(tokens.verify_refresh(&pair.refresh).is_ok());
    }

    #[test]
    fn test_garbage_is_invalid() {
        assert!(matches!(service().verify_access("not.a.jwt"), Err(TokenError::Invalid)));
    }
}
