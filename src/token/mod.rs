//! Admin access token issuance.
//!
//! [`TokenIssuer`] trades the stored service account key for a short-lived
//! OAuth2 bearer token using the JWT-bearer grant. [`lifecycle`] interprets an
//! issued token against a clock, and [`TokenSession`] owns the operator's
//! current token between requests.

pub mod lifecycle;
pub mod session;

pub use session::TokenSession;

use crate::core::{parse_oauth_error, ErrorKind};
use crate::credentials::{CredentialError, CredentialStore, ServiceAccountCredential};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;


/// Scopes requested for every admin token.
pub const ADMIN_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/firebase.messaging",
];

/// Lifetime assumed when the provider does not report one.
pub const DEFAULT_EXPIRES_IN: i64 = 3600;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME: i64 = 3600;

#[derive(Error, Debug)]
pub enum IssuanceError {
    #[error("Service account file not found. Please upload your adminsdk.json first.")]
    NoCredential,
    #[error("Stored service account is invalid: {0}")]
    Credential(CredentialError),
    #[error("Service account private key could not be used: {0}")]
    MalformedKey(String),
    #[error("Invalid service account credentials. Please check your adminsdk.json file. ({0})")]
    InvalidGrant(String),
    #[error("{0}")]
    Provider(String),
    #[error("The service account changed while the token was being issued. Please try again.")]
    Superseded,
}

impl IssuanceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IssuanceError::NoCredential
            | IssuanceError::Credential(_)
            | IssuanceError::MalformedKey(_)
            | IssuanceError::InvalidGrant(_)
            | IssuanceError::Superseded => ErrorKind::Credential,
            IssuanceError::Provider(_) => ErrorKind::Upstream,
        }
    }
}

impl From<CredentialError> for IssuanceError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::NotFound => IssuanceError::NoCredential,
            CredentialError::Io(e) => {
                IssuanceError::Provider(format!("failed to read service account: {}", e))
            }
            other => IssuanceError::Credential(other),
        }
    }
}

/// A bearer token minted from the stored service account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedAccessToken {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in whole seconds at the moment of issuance.
    pub expires_in: i64,
    /// Fixed at issuance; never recomputed.
    pub expires_at: DateTime<Utc>,
}

impl IssuedAccessToken {
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.expires_at - Duration::seconds(self.expires_in)
    }
}

impl std::fmt::Debug for IssuedAccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedAccessToken")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenEndpointResponse {
    access_token: Option<String>,
    expires_in: Option<f64>,
}

/// Exchanges the stored service account key for admin access tokens.
///
/// Holds no token state of its own; every call to [`TokenIssuer::issue`] reads
/// the store and performs a fresh exchange.
#[derive(Clone)]
pub struct TokenIssuer {
    store: Arc<dyn CredentialStore>,
    client: reqwest::Client,
}

impl TokenIssuer {
    pub fn new(store: Arc<dyn CredentialStore>, client: reqwest::Client) -> Self {
        Self { store, client }
    }

    pub async fn issue(&self) -> Result<IssuedAccessToken, IssuanceError> {
        let credential = self.store.get().await?;
        tracing::debug!(
            project_id = %credential.project_id,
            key = %credential.fingerprint(),
            "requesting admin access token"
        );

        let assertion = sign_assertion(&credential, Utc::now())?;

        let response = self
            .client
            .post(&credential.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| IssuanceError::Provider(format!("token exchange failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| IssuanceError::Provider(format!("token exchange failed: {}", e)))?;

        if !status.is_success() {
            return Err(match parse_oauth_error(status, &body) {
                Ok(oauth) if oauth.is_invalid_grant() => {
                    IssuanceError::InvalidGrant(oauth.display_message())
                }
                Ok(oauth) => IssuanceError::Provider(oauth.display_message()),
                Err(message) => IssuanceError::Provider(message),
            });
        }

        let parsed: TokenEndpointResponse = serde_json::from_str(&body).map_err(|e| {
            IssuanceError::Provider(format!("unexpected token endpoint response: {}", e))
        })?;

        let token = build_token(parsed, Utc::now())?;
        tracing::info!(
            project_id = %credential.project_id,
            expires_in = token.expires_in,
            "admin access token issued"
        );
        Ok(token)
    }
}

fn sign_assertion(
    credential: &ServiceAccountCredential,
    now: DateTime<Utc>,
) -> Result<String, IssuanceError> {
    let key = EncodingKey::from_rsa_pem(credential.private_key.as_bytes())
        .map_err(|e| IssuanceError::MalformedKey(e.to_string()))?;

    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(credential.private_key_id.clone());

    let scope = ADMIN_SCOPES.join(" ");
    let iat = now.timestamp();
    let claims = AssertionClaims {
        iss: &credential.client_email,
        sub: &credential.client_email,
        scope: &scope,
        aud: &credential.token_uri,
        iat,
        exp: iat + ASSERTION_LIFETIME,
    };

    jsonwebtoken::encode(&header, &claims, &key)
        .map_err(|e| IssuanceError::MalformedKey(e.to_string()))
}

// The provider reports its expiry relative to the moment it answered; the
// absolute instant is pinned to `now` and never moves afterwards.
fn build_token(
    response: TokenEndpointResponse,
    now: DateTime<Utc>,
) -> Result<IssuedAccessToken, IssuanceError> {
    let access_token = response
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| IssuanceError::Provider("Failed to obtain access token".to_string()))?;

    let expires_in = match response.expires_in {
        Some(seconds) => seconds.floor() as i64,
        None => DEFAULT_EXPIRES_IN,
    };
    if expires_in <= 0 {
        return Err(IssuanceError::Provider(format!(
            "token endpoint reported a non-positive lifetime ({}s)",
            expires_in
        )));
    }

    let expires_at = Duration::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| {
            IssuanceError::Provider(format!(
                "token endpoint reported an out-of-range lifetime ({}s)",
                expires_in
            ))
        })?;

    Ok(IssuedAccessToken {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in,
        expires_at,
    })
}
