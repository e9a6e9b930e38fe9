//! HTTP client for the identity service, used by other papernet services.
//!
//! Every call is one request/response. Non-2xx answers become
//! [`ClientError::Status`] carrying the remote status and message; transport
//! and decoding failures are returned as they are. No caching, no retries.

use std::fmt;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, instrument, warn};

use crate::auth::user::User;
use crate::types::AccessToken;

/// Default request timeout.
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Path prefix of the identity API.
const API_PREFIX: &str = "/auth/v2";

/// Remote client errors.
#[derive(Debug)]
pub enum ClientError {
    /// The service answered with a non-success status.
    Status { code: u16, message: String },
    /// Connection, timeout or protocol failure.
    Transport(reqwest::Error),
    /// The response body was not what the endpoint returns.
    Decode(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { code, message } => write!(f, "error in call ({}): {}", code, message),
            Self::Transport(e) => write!(f, "Transport error: {}", e),
            Self::Decode(msg) => write!(f, "Decode error: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err)
    }
}

impl ClientError {
    /// Remote status code, if the service answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Body of `GET /users/{id}/token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: AccessToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaperRequest {
    #[serde(rename = "paperID")]
    pub paper_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkRequest {
    #[serde(rename = "paperID")]
    pub paper_id: i64,
    pub bookmark: bool,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Client for the identity service's HTTP API.
#[derive(Debug, Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
    bearer: Option<AccessToken>,
}

impl AuthClient {
    /// Build a client for `base_url` (e.g. `http://localhost:1705`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer: None,
        })
    }

    /// Same client, sending `token` as bearer on every call.
    pub fn with_bearer(mut self, token: AccessToken) -> Self {
        self.bearer = Some(token);
        self
    }

    /// Fetch a user by id.
    #[instrument(skip(self))]
    pub async fn user(&self, id: i64) -> Result<User, ClientError> {
        let req = self.client.get(self.url(&format!("/users/{}", id)));
        self.send(req).await
    }

    /// Get a freshly issued token for a user.
    #[instrument(skip(self))]
    pub async fn token(&self, id: i64) -> Result<AccessToken, ClientError> {
        let req = self.client.get(self.url(&format!("/users/{}/token", id)));
        let res: TokenResponse = self.send(req).await?;
        Ok(res.access_token)
    }

    /// Register `paper_id` as owned by `user_id`.
    #[instrument(skip(self))]
    pub async fn create_paper(&self, user_id: i64, paper_id: i64) -> Result<User, ClientError> {
        let req = self
            .client
            .post(self.url(&format!("/users/{}/papers", user_id)))
            .json(&CreatePaperRequest { paper_id });
        self.send(req).await
    }

    /// Add or remove a bookmark for the caller identified by the bearer.
    #[instrument(skip(self))]
    pub async fn bookmark(&self, paper_id: i64, bookmark: bool) -> Result<User, ClientError> {
        let req = self
            .client
            .post(self.url("/bookmarks"))
            .json(&BookmarkRequest { paper_id, bookmark });
        self.send(req).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let req = match &self.bearer {
            Some(token) => req.bearer_auth(token.as_str()),
            None => req,
        };

        let response = req.send().await.map_err(|e| {
            warn!(error = %e, "Identity service request failed");
            ClientError::Transport(e)
        })?;

        Self::handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown error")
                        .to_string()
                });
            debug!(
                status = status.as_u16(),
                message = %message,
                "Identity service returned an error"
            );
            return Err(ClientError::Status {
                code: status.as_u16(),
                message,
            });
        }

        serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }
}
