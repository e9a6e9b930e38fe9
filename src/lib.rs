// Core modules
pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod types;

// Re-export key types and functions
pub use api::{AppState, create_router};
pub use auth::{AuthGate, TokenCodec, User, UserRepository, UserService, UserStore};
pub use client::{AuthClient, ClientError};
pub use config::ServiceConfig;
pub use db::{DatabaseConfig, create_connection, ensure_schema};

use anyhow::Result;
use std::sync::Arc;

/// Connect to the configured database and assemble the HTTP state.
pub async fn create_app(config: &ServiceConfig) -> Result<AppState> {
    let codec = config.token_codec()?;

    let db = create_connection(config.database.clone()).await?;
    ensure_schema(&db).await?;

    let repository: Arc<dyn UserRepository> =
        Arc::new(UserStore::new(db).with_timeout(config.storage_timeout()));

    Ok(AppState::new(
        UserService::new(repository, codec.clone()),
        AuthGate::new(codec),
    ))
}
