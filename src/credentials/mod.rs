//! Service account credential storage.
//!
//! A single slot holds the most recently uploaded Firebase service account key.
//! Uploads are validated before anything is written, and a successful upload
//! replaces the previous key atomically (last write wins).
//!
//! # Examples
//!
//! ```rust,no_run
//! # use fcm_admin_console::credentials::{CredentialStore, FileCredentialStore};
//! # async fn run(raw: Vec<u8>) {
//! let store = FileCredentialStore::new("service-account.json");
//! store.put(&raw).await.unwrap();
//! let credential = store.get().await.unwrap();
//! println!("loaded key for {}", credential.client_email);
//! # }
//! ```

pub mod file;
pub mod memory;

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

use crate::core::ErrorKind;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;


/// The only accepted value of the `type` member.
pub const SERVICE_ACCOUNT_TYPE: &str = "service_account";

/// Members that must be present and non-empty, in reporting order.
pub const REQUIRED_FIELDS: [&str; 8] = [
    "type",
    "project_id",
    "private_key_id",
    "private_key",
    "client_email",
    "client_id",
    "auth_uri",
    "token_uri",
];

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Invalid JSON file: {0}")]
    InvalidFormat(String),
    #[error("Invalid service account file. Missing fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("File is not a valid Firebase service account key (type: {0:?})")]
    WrongCredentialType(String),
    #[error("Service account not found")]
    NotFound,
    #[error("Credential storage failed: {0}")]
    Io(#[from] std::io::Error),
}

impl CredentialError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CredentialError::InvalidFormat(_)
            | CredentialError::MissingFields(_)
            | CredentialError::WrongCredentialType(_) => ErrorKind::BadInput,
            CredentialError::NotFound => ErrorKind::Credential,
            CredentialError::Io(_) => ErrorKind::Upstream,
        }
    }
}

/// A Firebase service account key as downloaded from the console.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceAccountCredential {
    #[serde(rename = "type")]
    pub key_type: String,
    pub project_id: String,
    pub private_key_id: String,
    pub private_key: String,
    pub client_email: String,
    pub client_id: String,
    pub auth_uri: String,
    pub token_uri: String,
    /// Remaining members of the key file (certificate URLs, universe domain).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ServiceAccountCredential {
    /// Validates an uploaded key file.
    ///
    /// Checks run in order: the input must be a JSON object, every required
    /// member must be a non-empty string (all absent members are reported at
    /// once), and `type` must be `service_account`.
    pub fn parse(raw: &[u8]) -> Result<Self, CredentialError> {
        let value: serde_json::Value = serde_json::from_slice(raw)
            .map_err(|e| CredentialError::InvalidFormat(e.to_string()))?;

        let object = value
            .as_object()
            .ok_or_else(|| CredentialError::InvalidFormat("expected a JSON object".to_string()))?;

        let missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|field| {
                !matches!(object.get(**field), Some(serde_json::Value::String(s)) if !s.is_empty())
            })
            .map(|field| field.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(CredentialError::MissingFields(missing));
        }

        let credential: ServiceAccountCredential = serde_json::from_value(value)
            .map_err(|e| CredentialError::InvalidFormat(e.to_string()))?;

        if credential.key_type != SERVICE_ACCOUNT_TYPE {
            return Err(CredentialError::WrongCredentialType(credential.key_type));
        }

        Ok(credential)
    }

    /// Short SHA-256 fingerprint of the private key, safe to log.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.private_key.as_bytes());
        hex::encode(&digest[..8])
    }
}

impl std::fmt::Debug for ServiceAccountCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountCredential")
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

/// Single-slot storage for the uploaded service account key.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Whether a credential is currently stored.
    async fn exists(&self) -> bool;

    /// Validates `raw` and, on success, replaces the stored credential with it
    /// verbatim and returns the parsed key. Invalid input leaves the store
    /// untouched.
    async fn put(&self, raw: &[u8]) -> Result<ServiceAccountCredential, CredentialError>;

    /// Loads the stored credential.
    async fn get(&self) -> Result<ServiceAccountCredential, CredentialError>;
}
