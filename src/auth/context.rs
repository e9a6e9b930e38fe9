//! Request-scoped caller identity.

use crate::auth::gate::AuthError;
use crate::auth::token::parse_user_id;
use crate::types::SubjectId;

/// What the authentication gate established about the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// No credential, or (optional gate only) a credential that failed
    /// verification.
    Anonymous,
    /// Verified token carrying a well-formed user id.
    User(SubjectId),
}

/// Caller identity attached to a request by the gate.
///
/// Immutable once created; handlers read it from the request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    identity: Identity,
}

impl UserContext {
    /// Context for a caller without credentials.
    pub fn anonymous() -> Self {
        Self {
            identity: Identity::Anonymous,
        }
    }

    /// Context for a verified caller.
    pub fn authenticated(subject: SubjectId) -> Self {
        Self {
            identity: Identity::User(subject),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.identity, Identity::User(_))
    }

    /// Subject as asserted by the token, if any.
    pub fn subject(&self) -> Option<&SubjectId> {
        match &self.identity {
            Identity::User(subject) => Some(subject),
            Identity::Anonymous => None,
        }
    }

    /// Caller id for operations that need a caller.
    ///
    /// Absent identity is `Unauthorized`, a non-numeric subject is `Forbidden`.
    pub fn user_id(&self) -> Result<i64, AuthError> {
        self.optional_user_id()?
            .ok_or_else(|| AuthError::Unauthorized("no user".to_string()))
    }

    /// Caller id for operations that personalise when a caller is known.
    pub fn optional_user_id(&self) -> Result<Option<i64>, AuthError> {
        match &self.identity {
            Identity::Anonymous => Ok(None),
            Identity::User(subject) => parse_user_id(subject.as_str())
                .map(Some)
                .ok_or_else(|| AuthError::Forbidden("invalid claims".to_string())),
        }
    }
}
