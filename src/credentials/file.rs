use crate::credentials::{CredentialError, CredentialStore, ServiceAccountCredential};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Stores the credential as a plain JSON file.
///
/// Writes go to a uniquely named sibling temporary file which is synced and
/// then renamed over the target, so readers see either the old key or the new
/// one. On Unix the file is created with mode `0600`.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Each write stages into its own uniquely named sibling, so overlapping
    // writers never share a staging file and the last rename wins.
    fn write_atomically(path: &Path, raw: &[u8]) -> Result<(), std::io::Error> {
        let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent,
            None => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        let mut staged = tempfile::Builder::new()
            .prefix(".service-account")
            .suffix(".tmp")
            .tempfile_in(parent)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            staged
                .as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        staged.write_all(raw)?;
        staged.as_file().sync_all()?;
        staged.persist(path)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl CredentialStore for FileCredentialStore {
    async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    async fn put(&self, raw: &[u8]) -> Result<ServiceAccountCredential, CredentialError> {
        let credential = ServiceAccountCredential::parse(raw)?;

        let path = self.path.clone();
        let raw = raw.to_vec();
        tokio::task::spawn_blocking(move || Self::write_atomically(&path, &raw))
            .await
            .map_err(std::io::Error::other)??;

        tracing::debug!(path = %self.path.display(), "service account file replaced");
        Ok(credential)
    }

    async fn get(&self) -> Result<ServiceAccountCredential, CredentialError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CredentialError::NotFound)
            }
            Err(e) => return Err(e.into()),
        };

        ServiceAccountCredential::parse(&raw)
    }
}
