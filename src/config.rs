//! Process configuration.
//!
//! Values are layered, later sources winning:
//!
//! 1. built-in defaults,
//! 2. `config/default.{toml,json,yaml}` (optional),
//! 3. `config/{RUN_ENV}.{toml,json,yaml}` (optional, `RUN_ENV` defaults to `debug`),
//! 4. environment variables prefixed with `FCM_CONSOLE__`, e.g.
//!    `FCM_CONSOLE__FIREBASE__PROJECT_ID` or `FCM_CONSOLE__MESSAGING__SERVER_KEY`.
//!
//! A `.env` file in the working directory is loaded into the environment first.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const ENV_PREFIX: &str = "FCM_CONSOLE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Missing required configuration: {}", .0.join(", "))]
    Missing(Vec<String>),
    #[error("Invalid configuration value for {0}: {1}")]
    Invalid(String, String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub firebase: FirebaseWebConfig,
    #[serde(default)]
    pub credentials: CredentialConfig,
    #[serde(default)]
    pub messaging: MessagingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

/// Public web SDK settings handed to the browser.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FirebaseWebConfig {
    pub api_key: Option<String>,
    pub auth_domain: Option<String>,
    pub project_id: Option<String>,
    pub storage_bucket: Option<String>,
    pub messaging_sender_id: Option<String>,
    pub app_id: Option<String>,
    pub measurement_id: Option<String>,
    pub vapid_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    #[serde(default = "default_credential_path")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Legacy FCM server key. Without it, IID calls use a token minted from
    /// the uploaded service account.
    pub server_key: Option<String>,
    #[serde(default = "default_iid_base_url")]
    pub iid_base_url: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_max_upload_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_credential_path() -> String {
    "service-account.json".to_string()
}

fn default_iid_base_url() -> String {
    "https://iid.googleapis.com".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            request_timeout_secs: default_request_timeout_secs(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            path: default_credential_path(),
        }
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            server_key: None,
            iid_base_url: default_iid_base_url(),
        }
    }
}

impl AppConfig {
    /// Loads and validates the configuration from files and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        ensure_dotenv_loaded();

        let run_env = std::env::var("RUN_ENV").unwrap_or_else(|_| "debug".to_string());
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", run_env)).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            );

        Self::from_source(builder.build()?)
    }

    pub fn from_source(source: config::Config) -> Result<Self, ConfigError> {
        let config: AppConfig = source.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Fails when any required setting is absent, naming all of them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("firebase.api_key", &self.firebase.api_key),
            ("firebase.project_id", &self.firebase.project_id),
            ("firebase.messaging_sender_id", &self.firebase.messaging_sender_id),
            ("firebase.app_id", &self.firebase.app_id),
        ];

        let missing: Vec<String> = required
            .iter()
            .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
            .map(|(name, _)| name.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "server.request_timeout_secs".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        if url::Url::parse(&self.messaging.iid_base_url).is_err() {
            return Err(ConfigError::Invalid(
                "messaging.iid_base_url".to_string(),
                self.messaging.iid_base_url.clone(),
            ));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

static INIT_DOTENV: std::sync::Once = std::sync::Once::new();

/// Loads `.env` (or the file named by `DOTENV_OVERRIDE`) once per process.
pub fn ensure_dotenv_loaded() {
    INIT_DOTENV.call_once(|| {
        let path = std::env::var("DOTENV_OVERRIDE").unwrap_or_else(|_| ".env".to_string());
        dotenv::from_filename(path).ok();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(pairs: &[(&str, &str)]) -> config::Config {
        let mut builder = config::Config::builder();
        for (key, value) in pairs {
            builder = builder.set_override(*key, *value).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_defaults_with_required_values() {
        let config = AppConfig::from_source(source(&[
            ("firebase.api_key", "api-key"),
            ("firebase.project_id", "demo"),
            ("firebase.messaging_sender_id", "123"),
            ("firebase.app_id", "1:123:web:abc"),
        ]))
        .unwrap();

        assert_eq!(config.server.bind_addr, "127.0.0.1:3000");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.server.max_upload_bytes, 5 * 1024 * 1024);
        assert_eq!(config.credentials.path, "service-account.json");
        assert_eq!(config.messaging.iid_base_url, "https://iid.googleapis.com");
        assert!(config.messaging.server_key.is_none());
    }

    #[test]
    fn test_missing_required_values_are_all_reported() {
        let err = AppConfig::from_source(source(&[
            ("firebase.project_id", "demo"),
            ("firebase.app_id", "  "),
        ]))
        .unwrap_err();

        match err {
            ConfigError::Missing(keys) => assert_eq!(
                keys,
                vec!["firebase.api_key", "firebase.messaging_sender_id", "firebase.app_id"]
            ),
            other => panic!("expected Missing, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let err = AppConfig::from_source(source(&[
            ("firebase.api_key", "api-key"),
            ("firebase.project_id", "demo"),
            ("firebase.messaging_sender_id", "123"),
            ("firebase.app_id", "1:123:web:abc"),
            ("server.request_timeout_secs", "0"),
        ]))
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid(key, _) if key == "server.request_timeout_secs"));
    }
}
