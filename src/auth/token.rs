//! Bearer token codec.
//!
//! Tokens are HS256 JWTs carrying `user_id`, `iss` and `exp`. Only the
//! configured algorithm is accepted on decode; a token is valid until its
//! expiry and nothing in storage can revoke it.

use std::fmt;

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{AccessToken, Issuer, SubjectId};

/// Issuer tag stamped into every token.
pub const DEFAULT_ISSUER: &str = "papernet";

/// Validity window of a freshly issued token (two months).
pub const DEFAULT_VALIDITY_DAYS: i64 = 60;

/// The only signing algorithm the codec produces or accepts.
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Claims written into an issued token.
#[derive(Debug, Clone, Serialize)]
struct IssuedClaims {
    user_id: i64,
    iss: String,
    exp: i64,
}

/// Claims as read back from a verified token.
///
/// `user_id` is kept loose so that a correctly signed token with an
/// unusable identity can be told apart from a bad token.
#[derive(Debug, Deserialize)]
struct VerifiedClaims {
    #[serde(default)]
    user_id: serde_json::Value,
}

/// Token codec errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The identity handed to `encode` is not a positive integer.
    InvalidIdentity(String),
    /// Signature, structure, algorithm, issuer or expiry check failed.
    InvalidToken(String),
    /// The token verified but its `user_id` claim is not a positive integer.
    MalformedClaims(String),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidIdentity(id) => write!(f, "Invalid identity: {} is not a user id", id),
            Self::InvalidToken(msg) => write!(f, "Invalid token: {}", msg),
            Self::MalformedClaims(msg) => write!(f, "Invalid claims: {}", msg),
        }
    }
}

impl std::error::Error for TokenError {}

/// Encodes user identities into signed, time-bounded tokens and back.
///
/// The codec is immutable after construction and is shared across request
/// workers behind an `Arc`.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: Issuer,
    validity: Duration,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Create a codec signing with `key` and the default issuer and validity.
    pub fn new(key: impl AsRef<[u8]>) -> Self {
        let key = key.as_ref();
        Self {
            encoding_key: EncodingKey::from_secret(key),
            decoding_key: DecodingKey::from_secret(key),
            issuer: Issuer::new(DEFAULT_ISSUER),
            validity: Duration::days(DEFAULT_VALIDITY_DAYS),
        }
    }

    /// Override the validity window of issued tokens.
    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    /// Issuer tag written to and required from tokens.
    pub fn issuer(&self) -> &Issuer {
        &self.issuer
    }

    /// Validity window of issued tokens.
    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Issue a token asserting `user_id`.
    pub fn encode(&self, user_id: &str) -> Result<AccessToken, TokenError> {
        let id = parse_user_id(user_id)
            .ok_or_else(|| TokenError::InvalidIdentity(user_id.to_string()))?;

        let claims = IssuedClaims {
            user_id: id,
            iss: self.issuer.to_string(),
            exp: (Utc::now() + self.validity).timestamp(),
        };

        let token = encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::InvalidIdentity(format!("{}: {}", user_id, e)))?;

        Ok(AccessToken::new(token))
    }

    /// Verify `token` and return the user id it asserts.
    pub fn decode(&self, token: &str) -> Result<SubjectId, TokenError> {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.leeway = 0;

        let data = decode::<VerifiedClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| TokenError::InvalidToken(e.to_string()))?;

        let subject = match &data.claims.user_id {
            serde_json::Value::Number(n) => n.as_i64().filter(|id| *id > 0),
            serde_json::Value::String(s) => parse_user_id(s),
            _ => None,
        };

        match subject {
            Some(id) => {
                debug!(user_id = id, "Token verified");
                Ok(SubjectId::new(id.to_string()))
            }
            None => Err(TokenError::MalformedClaims(format!(
                "user_id claim {} is not a user id",
                data.claims.user_id
            ))),
        }
    }
}

/// Parse a positive integer user id.
pub fn parse_user_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|id| *id > 0)
}
