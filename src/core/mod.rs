pub mod middleware;

use serde::Deserialize;
use std::time::Duration;

/// Default bound for every outbound call (token exchange, IID).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Broad remediation class of a failure.
///
/// Operators fix these differently: correct the input, replace the credential,
/// or try again later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadInput,
    Credential,
    Upstream,
}

/// Error body returned by Google's OAuth2 token endpoint.
#[derive(Debug, Deserialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    pub error_description: Option<String>,
}

impl OAuthErrorResponse {
    pub fn is_invalid_grant(&self) -> bool {
        self.error == "invalid_grant"
    }

    pub fn display_message(&self) -> String {
        match &self.error_description {
            Some(description) => format!("{}: {}", self.error, description),
            None => self.error.clone(),
        }
    }
}

/// Parses an OAuth2 error body, falling back to the raw text and status when
/// the provider answered with something else.
pub fn parse_oauth_error(status: reqwest::StatusCode, body: &str) -> Result<OAuthErrorResponse, String> {
    serde_json::from_str::<OAuthErrorResponse>(body).map_err(|_| {
        if body.is_empty() {
            format!("token endpoint returned {}", status)
        } else {
            format!("token endpoint returned {}: {}", status, body)
        }
    })
}

/// Builds the plain HTTP client shared by the issuer and the membership client.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}
