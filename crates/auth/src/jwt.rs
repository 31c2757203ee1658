//! HS256 token issuing and validation.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};

/// Lifetime of tokens minted at registration, in seconds.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum TokenError {
    /// Signature, header or payload could not be verified/decoded.
    #[error("malformed or unverifiable token: {0}")]
    Decode(#[source] jsonwebtoken::errors::Error),

    #[error("failed to sign token: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Verifies a bearer token and yields its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError>;
}

/// Mints bearer tokens for a subject.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, subject: &str, now: DateTime<Utc>) -> Result<String, TokenError>;
}

/// Symmetric HS256 signer/verifier backed by a single shared secret.
#[derive(Clone)]
pub struct Hs256Jwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl Hs256Jwt {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self::with_ttl(secret, Duration::seconds(DEFAULT_TOKEN_TTL_SECS))
    }

    pub fn with_ttl(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        let secret = secret.as_ref();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time checks run in `validate_claims` against the caller's clock.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::from(["exp".to_string(), "sub".to_string()]);
        validation
    }
}

impl core::fmt::Debug for Hs256Jwt {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256Jwt").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl JwtValidator for Hs256Jwt {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.decoding, &Self::validation())
            .map_err(TokenError::Decode)?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

impl TokenIssuer for Hs256Jwt {
    fn issue(&self, subject: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = JwtClaims::new(subject, now, self.ttl);
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(TokenError::Sign)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_validates_and_carries_subject() {
        let jwt = Hs256Jwt::new("secret");
        let now = Utc::now();

        let token = jwt.issue("alice", now).unwrap();
        let claims = jwt.validate(&token, now).unwrap();

        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.exp, (now + Duration::seconds(DEFAULT_TOKEN_TTL_SECS)).timestamp());
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let now = Utc::now();
        let token = Hs256Jwt::new("one").issue("alice", now).unwrap();

        let err = Hs256Jwt::new("two").validate(&token, now).unwrap_err();
        assert!(matches!(err, TokenError::Decode(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = Hs256Jwt::with_ttl("secret", Duration::seconds(5));
        let now = Utc::now();
        let token = jwt.issue("alice", now).unwrap();

        let err = jwt.validate(&token, now + Duration::seconds(5)).unwrap_err();
        assert!(matches!(err, TokenError::Claims(TokenValidationError::Expired)));
    }

    #[test]
    fn garbage_is_rejected() {
        let jwt = Hs256Jwt::new("secret");
        assert!(matches!(
            jwt.validate("not.a.token", Utc::now()),
            Err(TokenError::Decode(_))
        ));
    }

    #[test]
    fn token_without_subject_is_rejected() {
        #[derive(serde::Serialize)]
        struct NoSub {
            exp: i64,
        }

        let now = Utc::now();
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &NoSub { exp: (now + Duration::hours(1)).timestamp() },
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        assert!(Hs256Jwt::new("secret").validate(&token, now).is_err());
    }

    #[test]
    fn other_algorithms_are_rejected() {
        let now = Utc::now();
        let claims = JwtClaims::new("alice", now, Duration::hours(1));
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        assert!(Hs256Jwt::new("secret").validate(&token, now).is_err());
    }
}
