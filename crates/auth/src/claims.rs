use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JWT claims carried by every bearer token.
///
/// Timestamps are unix seconds, as registered JWT claims require.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject: the username the token was issued to.
    pub sub: String,

    /// Expiration time.
    pub exp: i64,

    /// Issued-at time. Optional so tokens minted elsewhere with only
    /// `sub` + `exp` still validate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl JwtClaims {
    /// Claims for `subject`, valid from `now` for `ttl`.
    pub fn new(subject: impl Into<String>, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: subject.into(),
            exp: (now + ttl).timestamp(),
            iat: Some(now.timestamp()),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,

    #[error("token subject is empty")]
    MissingSubject,
}

/// Deterministically validate JWT claims against `now`.
///
/// No clock-skew tolerance is applied. Signature verification happens before
/// this, in [`crate::jwt`].
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.sub.trim().is_empty() {
        return Err(TokenValidationError::MissingSubject);
    }

    let now = now.timestamp();
    if let Some(iat) = claims.iat {
        if claims.exp <= iat {
            return Err(TokenValidationError::InvalidTimeWindow);
        }
        if now < iat {
            return Err(TokenValidationError::NotYetValid);
        }
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn fresh_claims_are_valid() {
        let claims = JwtClaims::new("alice", at(1_000), Duration::hours(24));
        assert_eq!(validate_claims(&claims, at(1_000)), Ok(()));
        assert_eq!(validate_claims(&claims, at(1_000 + 86_399)), Ok(()));
    }

    #[test]
    fn expiry_is_exact_with_no_leeway() {
        let claims = JwtClaims::new("alice", at(1_000), Duration::seconds(10));
        assert_eq!(
            validate_claims(&claims, at(1_010)),
            Err(TokenValidationError::Expired)
        );
    }

    #[test]
    fn future_issued_at_is_rejected() {
        let claims = JwtClaims::new("alice", at(2_000), Duration::hours(1));
        assert_eq!(
            validate_claims(&claims, at(1_999)),
            Err(TokenValidationError::NotYetValid)
        );
    }

    #[test]
    fn inverted_window_is_rejected() {
        let claims = JwtClaims {
            sub: "alice".into(),
            exp: 100,
            iat: Some(100),
        };
        assert_eq!(
            validate_claims(&claims, at(50)),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }

    #[test]
    fn claims_without_iat_only_check_expiry() {
        let claims = JwtClaims {
            sub: "bob".into(),
            exp: 500,
            iat: None,
        };
        assert_eq!(validate_claims(&claims, at(0)), Ok(()));
        assert_eq!(validate_claims(&claims, at(500)), Err(TokenValidationError::Expired));
    }

    #[test]
    fn empty_subject_is_rejected() {
        let claims = JwtClaims::new("  ", at(0), Duration::hours(1));
        assert_eq!(
            validate_claims(&claims, at(1)),
            Err(TokenValidationError::MissingSubject)
        );
    }
}
