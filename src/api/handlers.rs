use crate::api::{membership_error, ApiError, ConsoleState, MembershipAction};
use crate::config::FirebaseWebConfig;
use crate::messaging::models::NotificationPayload;
use crate::token::lifecycle::display_remaining;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Multipart field carrying the uploaded key file.
pub const UPLOAD_FIELD: &str = "serviceAccount";

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

impl SuccessResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct AdminTokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

#[derive(Debug, Serialize)]
pub struct TokenStatusResponse {
    pub state: &'static str,
    pub remaining: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TopicRequest {
    #[serde(default, alias = "deviceToken")]
    pub token: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
}

pub async fn upload_service_account(
    State(state): State<ConsoleState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::new(e.status(), e.body_text()))?;
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), e.body_text()))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
            upload = Some(bytes);
            break;
        }
    }

    let raw = upload.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    state.session.upload(&raw).await?;

    Ok(SuccessResponse::new("Service account uploaded successfully"))
}

pub async fn generate_admin_token(
    State(state): State<ConsoleState>,
) -> Result<Json<AdminTokenResponse>, ApiError> {
    let token = state.session.refresh().await?;

    Ok(Json(AdminTokenResponse {
        access_token: token.access_token,
        expires_in: token.expires_in,
        token_type: token.token_type,
    }))
}

pub async fn admin_token_status(State(state): State<ConsoleState>) -> Json<TokenStatusResponse> {
    let now = Utc::now();
    let status = state.session.status(now).await;
    let token = status.token();

    Json(TokenStatusResponse {
        state: status.label(),
        remaining: display_remaining(token, now),
        expires_at: token.map(|t| t.expires_at),
        token_type: token.map(|t| t.token_type.clone()),
    })
}

pub async fn reset_admin_token(State(state): State<ConsoleState>) -> Json<SuccessResponse> {
    state.session.reset().await;
    SuccessResponse::new("Admin token session reset")
}

pub async fn subscribe_topic(
    State(state): State<ConsoleState>,
    body: Result<Json<TopicRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let token = request.token.unwrap_or_default();
    let topic = request.topic.unwrap_or_default();

    state
        .membership
        .subscribe(&token, &topic)
        .await
        .map_err(|e| membership_error(MembershipAction::Subscribe, e))?;

    Ok(SuccessResponse::new(format!(
        "Successfully subscribed to topic: {}",
        topic.trim()
    )))
}

pub async fn unsubscribe_topic(
    State(state): State<ConsoleState>,
    body: Result<Json<TopicRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let token = request.token.unwrap_or_default();
    let topic = request.topic.unwrap_or_default();

    state
        .membership
        .unsubscribe(&token, &topic)
        .await
        .map_err(|e| membership_error(MembershipAction::Unsubscribe, e))?;

    Ok(SuccessResponse::new(format!(
        "Successfully unsubscribed from topic: {}",
        topic.trim()
    )))
}

pub async fn firebase_config(State(state): State<ConsoleState>) -> Json<FirebaseWebConfig> {
    Json(state.web_config.as_ref().clone())
}

pub async fn deliver_notification(
    State(state): State<ConsoleState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(message) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    state
        .notifications
        .deliver(NotificationPayload::from_message(&message))?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn latest_notification(State(state): State<ConsoleState>) -> Response {
    match state.inbox.latest().await {
        Some(payload) => Json(payload).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

pub async fn clear_notification(State(state): State<ConsoleState>) -> StatusCode {
    state.inbox.clear().await;
    StatusCode::NO_CONTENT
}
