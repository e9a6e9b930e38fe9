//! HTTP boundary error.
//!
//! Every failure leaving the service becomes `{"error": "<message>"}` with
//! the status carried by the error. Storage failures are
//! logged in full and answered with a generic message.

use std::fmt;

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::{StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::auth::gate::AuthError;
use crate::auth::service::ServiceError;
use crate::auth::token::TokenError;
use crate::auth::user_store::StoreError;

/// Error returned by handlers and the authentication middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// 500 with a generic message; `detail` only goes to the log.
    pub fn internal(detail: impl fmt::Display) -> Self {
        error!(error = %detail, "Internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: &self.message,
        });
        let mut response = (self.status, body).into_response();

        if self.status == StatusCode::UNAUTHORIZED {
            if let Ok(value) = "Bearer realm=\"papernet\"".parse() {
                response.headers_mut().insert(WWW_AUTHENTICATE, value);
            }
        }

        response
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthorized(msg) => Self::new(StatusCode::UNAUTHORIZED, msg),
            AuthError::Forbidden(msg) => Self::new(StatusCode::FORBIDDEN, msg),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidIdentity(id) => {
                Self::bad_request(TokenError::InvalidIdentity(id).to_string())
            }
            TokenError::InvalidToken(_) => Self::new(StatusCode::UNAUTHORIZED, "invalid token"),
            TokenError::MalformedClaims(_) => Self::new(StatusCode::FORBIDDEN, "invalid claims"),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::internal(err)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Auth(e) => e.into(),
            ServiceError::NotFound(id) => Self::not_found(format!("user {} not found", id)),
            ServiceError::Store(e) => e.into(),
            ServiceError::Token(e) => e.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn read_body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unauthorized_response() {
        let response =
            ApiError::from(AuthError::Unauthorized("no user".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(WWW_AUTHENTICATE));
        assert_eq!(
            read_body_json(response).await,
            serde_json::json!({"error": "no user"})
        );
    }

    #[tokio::test]
    async fn test_forbidden_response() {
        let response =
            ApiError::from(AuthError::Forbidden("invalid claims".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            read_body_json(response).await,
            serde_json::json!({"error": "invalid claims"})
        );
    }

    #[tokio::test]
    async fn test_storage_error_is_generic() {
        let response =
            ApiError::from(StoreError::Storage("disk on fire".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_body_json(response).await;
        assert_eq!(body["error"], "internal server error");
    }

    #[test]
    fn test_timeout_maps_to_internal() {
        let err = ApiError::from(StoreError::Timeout(Duration::from_secs(5)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_token_errors() {
        assert_eq!(
            ApiError::from(TokenError::InvalidIdentity("abc".to_string())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(TokenError::InvalidToken("expired".to_string())).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(TokenError::MalformedClaims("user_id".to_string())).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_service_errors() {
        let err = ApiError::from(ServiceError::NotFound(7));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.message(), "user 7 not found");

        let err = ApiError::from(ServiceError::Auth(AuthError::Forbidden("nope".to_string())));
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }
}
