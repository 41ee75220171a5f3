use crate::credentials::{CredentialError, CredentialStore, ServiceAccountCredential};
use tokio::sync::RwLock;

/// Keeps the credential in process memory only; nothing touches disk.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    raw: RwLock<Option<Vec<u8>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn exists(&self) -> bool {
        self.raw.read().await.is_some()
    }

    async fn put(&self, raw: &[u8]) -> Result<ServiceAccountCredential, CredentialError> {
        let credential = ServiceAccountCredential::parse(raw)?;
        *self.raw.write().await = Some(raw.to_vec());
        Ok(credential)
    }

    async fn get(&self) -> Result<ServiceAccountCredential, CredentialError> {
        let raw = self.raw.read().await;
        match raw.as_deref() {
            Some(raw) => ServiceAccountCredential::parse(raw),
            None => Err(CredentialError::NotFound),
        }
    }
}
