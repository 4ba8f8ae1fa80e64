//! Session tokens.
//!
//! HS256 JWTs carrying `{_id, username, exp, iat}`. Validity depends only on
//! the signature, the secret and the current time; there is no revocation
//! list. Expiry is checked against the injected [`TimeSource`] rather than
//! the library's wall clock so the 7-day boundary is testable.

use crate::auth::credentials::CredentialRecord;
use crate::ports::TimeSource;
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    /// Expiry, seconds since epoch
    pub exp: u64,
    /// Issued-at, seconds since epoch
    pub iat: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("invalid token signature")]
    BadSignature,
    #[error("token expired at {exp}")]
    Expired { exp: u64 },
    #[error("failed to issue token: {0}")]
    Issue(String),
}

/// Mints and validates session tokens
#[derive(Clone)]
pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    clock: Arc<dyn TimeSource>,
}

impl SessionIssuer {
    pub fn new(secret: &str, ttl: Duration, clock: Arc<dyn TimeSource>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // exp is checked against `clock`
        validation.validate_exp = false;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `record` at the current time
    pub fn issue(&self, record: &CredentialRecord) -> Result<String, SessionError> {
        self.issue_at(record, self.clock.now())
    }

    /// Issue a token as of `now`; deterministic for a given clock and secret
    pub fn issue_at(&self, record: &CredentialRecord, now: u64) -> Result<String, SessionError> {
        let claims = Claims {
            id: record.id.to_string(),
            username: record.username.clone(),
            exp: now.saturating_add(self.ttl.as_secs()),
            iat: now,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| SessionError::Issue(e.to_string()))
    }

    /// Validate a token at the current time
    pub fn validate(&self, token: &str) -> Result<Claims, SessionError> {
        self.validate_at(token, self.clock.now())
    }

    /// Validate a token as of `now`
    pub fn validate_at(&self, token: &str, now: u64) -> Result<Claims, SessionError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => SessionError::BadSignature,
                _ => SessionError::Malformed(e.to_string()),
            })?;

        if now >= data.claims.exp {
            return Err(SessionError::Expired {
                exp: data.claims.exp,
            });
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ManualTimeSource;

    const DAY: u64 = 24 * 60 * 60;
    const T: u64 = 1_700_000_000;

    fn issuer(secret: &str) -> (SessionIssuer, Arc<ManualTimeSource>) {
        let clock = Arc::new(ManualTimeSource::new(T));
        let issuer = SessionIssuer::new(secret, Duration::from_secs(7 * DAY), clock.clone());
        (issuer, clock)
    }

    #[test]
    fn test_seven_day_boundary() {
        let (issuer, clock) = issuer("s3cret");
        let record = CredentialRecord::new("alice", "secret123");
        let token = issuer.issue(&record).unwrap();

        clock.set(T + 6 * DAY);
        let claims = issuer.validate(&token).unwrap();
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.id, record.id.to_string());
        assert_eq!(claims.iat, T);
        assert_eq!(claims.exp, T + 7 * DAY);

        clock.set(T + 8 * DAY);
        assert_eq!(
            issuer.validate(&token),
            Err(SessionError::Expired { exp: T + 7 * DAY })
        );
    }

    #[test]
    fn test_deterministic_issue() {
        let (issuer, _) = issuer("s3cret");
        let record = CredentialRecord::new("alice", "pw");
        assert_eq!(
            issuer.issue_at(&record, T).unwrap(),
            issuer.issue_at(&record, T).unwrap()
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let (issuer_a, _) = issuer("secret-a");
        let (issuer_b, _) = issuer("secret-b");
        let token = issuer_a.issue(&CredentialRecord::new("alice", "pw")).unwrap();
        assert_eq!(issuer_b.validate(&token), Err(SessionError::BadSignature));
    }

    #[test]
    fn test_garbage_rejected() {
        let (issuer, _) = issuer("s3cret");
        assert!(matches!(
            issuer.validate("not.a.token"),
            Err(SessionError::Malformed(_))
        ));
        assert!(matches!(issuer.validate(""), Err(SessionError::Malformed(_))));
    }
}
