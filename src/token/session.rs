use crate::credentials::{CredentialError, CredentialStore};
use crate::token::lifecycle::{self, TokenStatus};
use crate::token::{IssuanceError, IssuedAccessToken, TokenIssuer};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Default)]
struct SessionState {
    has_credential: bool,
    token: Option<IssuedAccessToken>,
    /// Bumped by every upload and reset. Issuance that started under an older
    /// generation never lands in the session.
    generation: u64,
}

/// The operator's admin-token session.
///
/// Owns the logical "a key has been uploaded" flag and the most recently
/// issued token. Issuance is serialized: a refresh waits for any refresh
/// already in flight, so the last one started is the one that sticks. An
/// upload or reset discards whatever was being issued when it happened.
pub struct TokenSession {
    store: Arc<dyn CredentialStore>,
    issuer: TokenIssuer,
    state: RwLock<SessionState>,
    issuing: Mutex<()>,
}

impl TokenSession {
    /// Creates a session whose presence flag mirrors what the store already holds.
    pub async fn new(store: Arc<dyn CredentialStore>, client: reqwest::Client) -> Self {
        let has_credential = store.exists().await;
        let issuer = TokenIssuer::new(store.clone(), client);
        Self {
            store,
            issuer,
            state: RwLock::new(SessionState {
                has_credential,
                ..SessionState::default()
            }),
            issuing: Mutex::new(()),
        }
    }

    pub async fn has_credential(&self) -> bool {
        self.state.read().await.has_credential
    }

    /// Validates and stores an uploaded key file.
    pub async fn upload(&self, raw: &[u8]) -> Result<(), CredentialError> {
        let credential = self.store.put(raw).await?;
        {
            let mut state = self.state.write().await;
            state.has_credential = true;
            state.generation += 1;
        }

        tracing::info!(
            project_id = %credential.project_id,
            client_email = %credential.client_email,
            key = %credential.fingerprint(),
            "service account uploaded"
        );
        Ok(())
    }

    fn current_generation(state: &SessionState) -> Result<u64, IssuanceError> {
        if state.has_credential {
            Ok(state.generation)
        } else {
            Err(IssuanceError::NoCredential)
        }
    }

    /// Issues a new token and replaces the tracked one wholesale.
    ///
    /// On failure the previously tracked token, if any, is kept.
    pub async fn refresh(&self) -> Result<IssuedAccessToken, IssuanceError> {
        let _guard = self.issuing.lock().await;
        let generation = Self::current_generation(&*self.state.read().await)?;

        let token = match self.issuer.issue().await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "admin token refresh failed");
                return Err(e);
            }
        };

        let mut state = self.state.write().await;
        if state.generation != generation {
            tracing::warn!("session changed during admin token refresh; token discarded");
            return Err(IssuanceError::Superseded);
        }
        state.token = Some(token.clone());
        Ok(token)
    }

    /// Bearer token for outbound API calls.
    ///
    /// Reuses the tracked token while it is active; otherwise issues a fresh
    /// one without tracking it. Fails once the session has been reset.
    pub async fn bearer_token(&self) -> Result<String, IssuanceError> {
        let generation = {
            let state = self.state.read().await;
            let generation = Self::current_generation(&state)?;
            if let Some(token) = state.token.as_ref() {
                if !lifecycle::is_expired(Some(token), Utc::now()) {
                    return Ok(token.access_token.clone());
                }
            }
            generation
        };

        let token = self.issuer.issue().await?;
        if self.state.read().await.generation != generation {
            return Err(IssuanceError::Superseded);
        }
        Ok(token.access_token)
    }

    /// Forgets the tracked token and the uploaded key. The stored file is left
    /// in place; a new upload is required before issuing again. Issuance still
    /// in flight is discarded when it completes.
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        state.token = None;
        state.has_credential = false;
        state.generation += 1;
        tracing::info!("admin token session reset");
    }

    pub async fn current_token(&self) -> Option<IssuedAccessToken> {
        self.state.read().await.token.clone()
    }

    pub async fn status(&self, now: DateTime<Utc>) -> TokenStatus {
        let state = self.state.read().await;
        lifecycle::status(state.has_credential, state.token.as_ref(), now)
    }
}
