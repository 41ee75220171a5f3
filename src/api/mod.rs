//! HTTP surface of the console.
//!
//! Every route answers with JSON. Failures use `{ "error": "..." }` and a
//! status that tells the operator what to do: 400 when the input or the
//! credential needs fixing, 500 when the upstream service (or local storage)
//! failed and a retry may help.

pub mod handlers;

#[cfg(test)]
mod tests;

use crate::config::{AppConfig, FirebaseWebConfig};
use crate::FirebaseConsole;
use crate::core::middleware::IidAuth;
use crate::core::{http_client, ErrorKind};
use crate::credentials::{CredentialError, CredentialStore, FileCredentialStore};
use crate::messaging::notifications::{self, NotificationError, NotificationInbox, NotificationSender};
use crate::messaging::{MembershipError, TopicMembershipClient};
use crate::token::{IssuanceError, TokenSession};
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

const NOTIFICATION_BUFFER: usize = 32;

/// Shared state behind every handler.
#[derive(Clone)]
pub struct ConsoleState {
    pub session: Arc<TokenSession>,
    pub membership: TopicMembershipClient,
    pub web_config: Arc<FirebaseWebConfig>,
    pub notifications: NotificationSender,
    pub inbox: Arc<NotificationInbox>,
}

impl ConsoleState {
    pub fn new(
        session: Arc<TokenSession>,
        membership: TopicMembershipClient,
        web_config: FirebaseWebConfig,
    ) -> Self {
        let (sender, stream) = notifications::channel(NOTIFICATION_BUFFER);
        Self {
            session,
            membership,
            web_config: Arc::new(web_config),
            notifications: sender,
            inbox: Arc::new(NotificationInbox::spawn(stream)),
        }
    }

    /// Wires the file-backed store, the token session and the IID client from
    /// the loaded configuration.
    pub async fn from_config(config: &AppConfig) -> Result<Self, reqwest::Error> {
        let http = http_client(config.request_timeout())?;
        let store: Arc<dyn CredentialStore> =
            Arc::new(FileCredentialStore::new(&config.credentials.path));
        let console = FirebaseConsole::new(store, http);
        let session = Arc::new(console.session().await);

        let auth = match &config.messaging.server_key {
            Some(key) if !key.trim().is_empty() => IidAuth::ServerKey(key.trim().to_string()),
            _ => {
                tracing::info!("no FCM server key configured; IID calls use service account tokens");
                IidAuth::ServiceAccount(session.clone())
            }
        };
        let membership = console.topics_with_url(auth, config.messaging.iid_base_url.clone());

        Ok(Self::new(session, membership, config.firebase.clone()))
    }
}

/// Routes mounted under `/api`.
pub fn routes(state: ConsoleState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route(
            "/upload-service-account",
            post(handlers::upload_service_account).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/generate-admin-token", post(handlers::generate_admin_token))
        .route("/admin-token", get(handlers::admin_token_status))
        .route("/admin-token/reset", post(handlers::reset_admin_token))
        .route("/subscribe-topic", post(handlers::subscribe_topic))
        .route("/unsubscribe-topic", post(handlers::unsubscribe_topic))
        .route("/firebase-config", get(handlers::firebase_config))
        .route("/notifications", post(handlers::deliver_notification))
        .route(
            "/notifications/latest",
            get(handlers::latest_notification).delete(handlers::clear_notification),
        )
        .with_state(state)
}

/// The complete application: API routes plus request tracing.
pub fn app(state: ConsoleState, max_upload_bytes: usize) -> Router {
    Router::new()
        .nest("/api", routes(state, max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}

/// Error payload returned by every handler.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }

    fn from_kind(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::BadInput | ErrorKind::Credential => Self::bad_request(message),
            ErrorKind::Upstream => Self::new(StatusCode::INTERNAL_SERVER_ERROR, message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::InvalidFormat(_) => Self::bad_request("Invalid JSON file"),
            CredentialError::WrongCredentialType(_) => {
                Self::bad_request("File is not a valid Firebase service account key")
            }
            CredentialError::Io(e) => {
                tracing::error!(error = %e, "failed to store service account");
                Self::internal()
            }
            other => Self::bad_request(other.to_string()),
        }
    }
}

impl From<IssuanceError> for ApiError {
    fn from(err: IssuanceError) -> Self {
        match err {
            IssuanceError::InvalidGrant(_) => Self::bad_request(
                "Invalid service account credentials. Please check your adminsdk.json file.",
            ),
            other => {
                if other.kind() == ErrorKind::Upstream {
                    tracing::error!(error = %other, "admin token generation failed");
                }
                Self::from_kind(other.kind(), other.to_string())
            }
        }
    }
}

impl From<NotificationError> for ApiError {
    fn from(err: NotificationError) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipAction {
    Subscribe,
    Unsubscribe,
}

impl MembershipAction {
    fn as_str(self) -> &'static str {
        match self {
            MembershipAction::Subscribe => "subscribe",
            MembershipAction::Unsubscribe => "unsubscribe",
        }
    }

    fn rejected_message(self) -> &'static str {
        match self {
            MembershipAction::Subscribe => "Failed to subscribe to topic",
            MembershipAction::Unsubscribe => "Failed to unsubscribe from topic",
        }
    }
}

/// Maps a topic membership failure for the given action.
pub fn membership_error(action: MembershipAction, err: MembershipError) -> ApiError {
    match err {
        MembershipError::InvalidInput(message) => ApiError::bad_request(message),
        MembershipError::ProviderRejected(..) => ApiError::bad_request(action.rejected_message()),
        other => {
            tracing::error!(action = action.as_str(), error = %other, "topic membership request failed");
            ApiError::from_kind(other.kind(), other.to_string())
        }
    }
}
