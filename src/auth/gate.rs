//! Authentication gate.
//!
//! Establishes the caller's identity from an `Authorization: Bearer` header
//! and hands a [`UserContext`] to the protected operation. The mandatory
//! variant rejects callers without a valid token; the optional variant lets
//! them through as anonymous. A verified token with malformed claims is
//! rejected with `Forbidden` by both variants before the operation runs.
//!
//! The gate is usable directly ([`AuthGate::run`]) or as axum middleware
//! ([`require_auth`], [`optional_auth`]) that stores the context in the
//! request extensions.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use http::header::AUTHORIZATION;
use tracing::{debug, warn};

use crate::api::error::ApiError;
use crate::auth::context::UserContext;
use crate::auth::token::{TokenCodec, TokenError};

/// Authentication errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Missing or unverifiable credentials.
    Unauthorized(String),
    /// Credentials present but unusable, or caller lacking rights.
    Forbidden(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            Self::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

/// Whether a request without a valid token may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Mandatory,
    Optional,
}

/// Token-checking gate shared by every protected route.
#[derive(Debug, Clone)]
pub struct AuthGate {
    codec: Arc<TokenCodec>,
}

impl AuthGate {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &Arc<TokenCodec> {
        &self.codec
    }

    /// Resolve the caller from the raw `Authorization` header value.
    pub fn authenticate(
        &self,
        authorization: Option<&str>,
        mode: AuthMode,
    ) -> Result<UserContext, AuthError> {
        let token = match authorization.map(bearer_token) {
            Some(Some(token)) => token,
            Some(None) => {
                return self.reject(mode, "invalid authorization header");
            }
            None => return self.reject(mode, "missing bearer token"),
        };

        match self.codec.decode(token) {
            Ok(subject) => {
                debug!(user_id = %subject, "Authenticated caller");
                Ok(UserContext::authenticated(subject))
            }
            Err(TokenError::MalformedClaims(reason)) => {
                warn!(reason = %reason, "Token carries malformed claims");
                Err(AuthError::Forbidden("invalid claims".to_string()))
            }
            Err(e) => {
                warn!(error = %e, "Rejected bearer token");
                self.reject(mode, "invalid token")
            }
        }
    }

    /// Run `f` once the caller is established. Errors raised by `f` are
    /// returned untouched.
    pub async fn run<F, Fut, T, E>(
        &self,
        authorization: Option<&str>,
        mode: AuthMode,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(UserContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<AuthError>,
    {
        let ctx = self.authenticate(authorization, mode)?;
        f(ctx).await
    }

    fn reject(&self, mode: AuthMode, reason: &str) -> Result<UserContext, AuthError> {
        match mode {
            AuthMode::Mandatory => Err(AuthError::Unauthorized(reason.to_string())),
            AuthMode::Optional => Ok(UserContext::anonymous()),
        }
    }
}

/// Strip the `Bearer ` scheme. The scheme name is case-insensitive.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

async fn gate_request(
    gate: &AuthGate,
    mode: AuthMode,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let authorization = req
        .headers()
        .get(AUTHORIZATION)
        .map(|h| h.to_str().unwrap_or_default());

    let ctx = gate.authenticate(authorization, mode)?;
    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}

/// Middleware for routes that require a caller.
pub async fn require_auth(
    State(gate): State<AuthGate>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    gate_request(&gate, AuthMode::Mandatory, req, next).await
}

/// Middleware for routes that personalise when a caller is known.
///
/// Missing or unverifiable tokens pass as anonymous; malformed claims are
/// still answered with 403.
pub async fn optional_auth(
    State(gate): State<AuthGate>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    gate_request(&gate, AuthMode::Optional, req, next).await
}
