use super::*;
use crate::core::middleware::IidAuthMiddleware;
use crate::credentials::MemoryCredentialStore;
use crate::test_support::service_account_bytes;
use axum::body::Body;
use axum::http::{header, Method, Request};
use httpmock::prelude::*;
use serde_json::{json, Value};
use tower::ServiceExt;

const BOUNDARY: &str = "console-test-boundary";

async fn test_app(server: &MockServer) -> (Router, ConsoleState) {
    let store: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::new());
    let session = Arc::new(TokenSession::new(store, reqwest::Client::new()).await);
    let membership = TopicMembershipClient::new_with_url(
        IidAuthMiddleware::new(IidAuth::ServerKey("server-key".to_string())),
        reqwest::Client::new(),
        server.base_url(),
    );
    let web_config = FirebaseWebConfig {
        project_id: Some("test-project".to_string()),
        vapid_key: Some("vapid".to_string()),
        ..Default::default()
    };

    let state = ConsoleState::new(session, membership, web_config);
    (app(state.clone(), 1024 * 1024), state)
}

fn upload_request(field: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"adminsdk.json\"\r\n",
            field
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/json\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/api/upload-service-account")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

#[tokio::test]
async fn test_upload_then_generate_token() {
    let server = MockServer::start();
    let _token_mock = server.mock(|when, then| {
        when.method(POST).path("/token");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "access_token": "ya29.api", "token_type": "Bearer" }));
    });
    let (app, _state) = test_app(&server).await;

    let (status, body) = send(&app, upload_request("serviceAccount", &service_account_bytes(&server.url("/token")))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "message": "Service account uploaded successfully" }));

    let (status, body) = send(&app, empty_request(Method::POST, "/api/generate-admin-token")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "access_token": "ya29.api", "expires_in": 3600, "token_type": "Bearer" }));

    let (status, body) = send(&app, empty_request(Method::GET, "/api/admin-token")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "active");
    assert_eq!(body["token_type"], "Bearer");
    let remaining = body["remaining"].as_str().unwrap();
    assert!(remaining == "1h 0m remaining" || remaining == "59m remaining", "{}", remaining);
}

#[tokio::test]
async fn test_upload_validation_errors() {
    let server = MockServer::start();
    let (app, _state) = test_app(&server).await;

    let (status, body) = send(&app, upload_request("serviceAccount", b"not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid JSON file");

    let (status, body) = send(&app, upload_request("serviceAccount", br#"{"type":"service_account"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Invalid service account file. Missing fields: project_id, private_key_id, private_key, client_email, client_id, auth_uri, token_uri"
    );

    let (status, body) = send(&app, upload_request("somethingElse", b"{}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file uploaded");
}

#[tokio::test]
async fn test_generate_without_upload_is_bad_request() {
    let server = MockServer::start();
    let (app, _state) = test_app(&server).await;

    let (status, body) = send(&app, empty_request(Method::POST, "/api/generate-admin-token")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Service account file not found. Please upload your adminsdk.json first."
    );

    let (_, body) = send(&app, empty_request(Method::GET, "/api/admin-token")).await;
    assert_eq!(body["state"], "no_credential");
    assert_eq!(body["remaining"], "");
}

#[tokio::test]
async fn test_generate_status_codes_follow_error_class() {
    let server = MockServer::start();
    let mut invalid_grant = server.mock(|when, then| {
        when.method(POST).path("/token");
        then.status(400)
            .header("content-type", "application/json")
            .json_body(json!({ "error": "invalid_grant", "error_description": "account not found" }));
    });
    let (app, _state) = test_app(&server).await;
    send(&app, upload_request("serviceAccount", &service_account_bytes(&server.url("/token")))).await;

    let (status, body) = send(&app, empty_request(Method::POST, "/api/generate-admin-token")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Invalid service account credentials. Please check your adminsdk.json file."
    );
    invalid_grant.delete();

    let _outage = server.mock(|when, then| {
        when.method(POST).path("/token");
        then.status(502).body("bad gateway");
    });
    let (status, body) = send(&app, empty_request(Method::POST, "/api/generate-admin-token")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("502"));
}

#[tokio::test]
async fn test_reset_clears_session() {
    let server = MockServer::start();
    let _token_mock = server.mock(|when, then| {
        when.method(POST).path("/token");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "access_token": "ya29.api", "expires_in": 3600 }));
    });
    let (app, state) = test_app(&server).await;
    send(&app, upload_request("serviceAccount", &service_account_bytes(&server.url("/token")))).await;
    send(&app, empty_request(Method::POST, "/api/generate-admin-token")).await;
    assert!(state.session.current_token().await.is_some());

    let (status, _) = send(&app, empty_request(Method::POST, "/api/admin-token/reset")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(state.session.current_token().await.is_none());

    let (status, _) = send(&app, empty_request(Method::POST, "/api/generate-admin-token")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_subscribe_and_unsubscribe_topic() {
    let server = MockServer::start();
    let subscribe = server.mock(|when, then| {
        when.method(POST)
            .path("/iid/v1/device-1/rel/topics/news")
            .header("authorization", "key=server-key");
        then.status(200).json_body(json!({}));
    });
    let unsubscribe = server.mock(|when, then| {
        when.method(DELETE).path("/iid/v1/device-1/rel/topics/news");
        then.status(200).json_body(json!({}));
    });
    let (app, _state) = test_app(&server).await;

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/api/subscribe-topic", json!({ "token": "device-1", "topic": " news " })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "message": "Successfully subscribed to topic: news" }));

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/api/unsubscribe-topic", json!({ "deviceToken": "device-1", "topic": "news" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Successfully unsubscribed from topic: news");

    subscribe.assert();
    unsubscribe.assert();
}

#[tokio::test]
async fn test_topic_errors() {
    let server = MockServer::start();
    let rejected = server.mock(|when, then| {
        when.method(POST).path("/iid/v1/stale/rel/topics/news");
        then.status(400).body("InvalidToken");
    });
    let (app, _state) = test_app(&server).await;

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/api/subscribe-topic", json!({ "topic": "news" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Token and topic are required");

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/api/subscribe-topic", json!({ "token": "stale", "topic": "news" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Failed to subscribe to topic");
    rejected.assert();
}

#[tokio::test]
async fn test_wrong_method_is_rejected() {
    let server = MockServer::start();
    let (app, _state) = test_app(&server).await;

    let (status, _) = send(&app, empty_request(Method::GET, "/api/generate-admin-token")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_firebase_config_is_served() {
    let server = MockServer::start();
    let (app, _state) = test_app(&server).await;

    let (status, body) = send(&app, empty_request(Method::GET, "/api/firebase-config")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["project_id"], "test-project");
    assert_eq!(body["vapid_key"], "vapid");
}

#[tokio::test]
async fn test_notification_inbox_endpoints() {
    let server = MockServer::start();
    let (app, _state) = test_app(&server).await;

    let (status, _) = send(&app, empty_request(Method::GET, "/api/notifications/latest")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/notifications",
            json!({ "notification": { "title": "Deploy", "body": "Done" }, "data": { "build": "7" } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let mut latest = Value::Null;
    for _ in 0..50 {
        let (status, body) = send(&app, empty_request(Method::GET, "/api/notifications/latest")).await;
        if status == StatusCode::OK {
            latest = body;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(latest, json!({ "title": "Deploy", "body": "Done", "data": { "build": "7" } }));

    let (status, _) = send(&app, empty_request(Method::DELETE, "/api/notifications/latest")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, empty_request(Method::GET, "/api/notifications/latest")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_unsubscribe_rejection_message() {
    let server = MockServer::start();
    let rejected = server.mock(|when, then| {
        when.method(DELETE).path("/iid/v1/stale/rel/topics/news");
        then.status(404).body("NOT_FOUND");
    });
    let (app, _state) = test_app(&server).await;

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/api/unsubscribe-topic", json!({ "token": "stale", "topic": "news" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Failed to unsubscribe from topic");
    rejected.assert();
}

#[test]
fn test_membership_error_mapping() {
    let err = membership_error(
        MembershipAction::Subscribe,
        MembershipError::ProviderRejected(400, "InvalidToken".to_string()),
    );
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    assert_eq!(err.message, "Failed to subscribe to topic");

    let err = membership_error(
        MembershipAction::Unsubscribe,
        MembershipError::InvalidInput("Token and topic are required".to_string()),
    );
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    assert_eq!(err.message, "Token and topic are required");
}
