use serde::{Deserialize, Serialize};
use std::{env, sync::Arc, time::Duration};

use crate::auth::token::{DEFAULT_VALIDITY_DAYS, TokenCodec};
use crate::auth::user_store::DEFAULT_STORAGE_TIMEOUT;
use crate::db::DatabaseConfig;

/// Environment variable holding the HS256 signing key.
pub const JWT_KEY_ENV: &str = "PAPERNET_JWT_KEY";

pub const DEFAULT_BIND: &str = "0.0.0.0:1705";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub bind: String,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Symmetric signing key. Never logged.
    #[serde(skip_serializing)]
    pub jwt_key: String,
    #[serde(default = "default_token_validity_days")]
    pub token_validity_days: i64,
    #[serde(default = "default_storage_timeout_ms")]
    pub storage_timeout_ms: u64,
}

fn default_token_validity_days() -> i64 {
    DEFAULT_VALIDITY_DAYS
}

fn default_storage_timeout_ms() -> u64 {
    DEFAULT_STORAGE_TIMEOUT.as_millis() as u64
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            database: DatabaseConfig::default(),
            jwt_key: env::var(JWT_KEY_ENV).unwrap_or_default(),
            token_validity_days: DEFAULT_VALIDITY_DAYS,
            storage_timeout_ms: default_storage_timeout_ms(),
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.jwt_key.trim().is_empty() {
            anyhow::bail!("{} must be set to a non-empty signing key", JWT_KEY_ENV);
        }
        if self.token_validity_days <= 0 {
            anyhow::bail!(
                "token validity must be positive, got {} days",
                self.token_validity_days
            );
        }
        if self.storage_timeout_ms == 0 {
            anyhow::bail!("storage timeout must be positive");
        }
        Ok(())
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }

    /// Codec built from the configured key and validity window.
    pub fn token_codec(&self) -> anyhow::Result<Arc<TokenCodec>> {
        self.validate()?;
        let validity = chrono::Duration::days(self.token_validity_days);
        Ok(Arc::new(
            TokenCodec::new(self.jwt_key.as_bytes()).with_validity(validity),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(key: &str) -> ServiceConfig {
        ServiceConfig {
            jwt_key: key.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_key_is_rejected() {
        let err = config("  ").validate().unwrap_err();
        assert!(err.to_string().contains(JWT_KEY_ENV));
        assert!(config("").token_codec().is_err());
    }

    #[test]
    fn test_non_positive_validity_is_rejected() {
        let mut cfg = config("secret");
        cfg.token_validity_days = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_token_codec_uses_configured_validity() {
        let mut cfg = config("secret");
        cfg.token_validity_days = 7;
        let codec = cfg.token_codec().unwrap();
        assert_eq!(codec.validity(), chrono::Duration::days(7));
    }

    #[test]
    fn test_key_is_not_serialised() {
        let json = serde_json::to_value(config("secret")).unwrap();
        assert!(json.get("jwt_key").is_none());
        assert_eq!(json["storage_timeout_ms"], 5000);
    }

    #[test]
    fn test_deserialize_defaults() {
        let cfg: ServiceConfig =
            serde_json::from_str(r#"{"bind": "127.0.0.1:9000", "jwt_key": "k"}"#).unwrap();
        assert_eq!(cfg.token_validity_days, DEFAULT_VALIDITY_DAYS);
        assert_eq!(cfg.storage_timeout(), DEFAULT_STORAGE_TIMEOUT);
        assert_eq!(cfg.database.url, DatabaseConfig::default().url);
        cfg.validate().unwrap();
    }
}
