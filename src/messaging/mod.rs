use crate::core::middleware::IidAuthMiddleware;
use crate::core::ErrorKind;
use crate::messaging::models::DeviceRegistrationToken;
use reqwest::{Client, Method};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use thiserror::Error;
use url::Url;

pub mod models;
pub mod notifications;

const IID_API: &str = "https://iid.googleapis.com";

#[derive(Error, Debug)]
pub enum MembershipError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Topic management rejected with {0}: {1}")]
    ProviderRejected(u16, String),
    #[error("Middleware error: {0}")]
    Request(#[from] reqwest_middleware::Error),
    #[error("Invalid IID endpoint: {0}")]
    Url(#[from] url::ParseError),
}

impl MembershipError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MembershipError::InvalidInput(_) => ErrorKind::BadInput,
            MembershipError::ProviderRejected(..)
            | MembershipError::Request(_)
            | MembershipError::Url(_) => ErrorKind::Upstream,
        }
    }
}

/// Subscribes and unsubscribes single devices to FCM topics through the
/// Instance ID relationship API.
#[derive(Clone)]
pub struct TopicMembershipClient {
    client: ClientWithMiddleware,
    base_url: String,
}

impl TopicMembershipClient {
    pub fn new(middleware: IidAuthMiddleware, http: Client) -> Self {
        Self::new_with_url(middleware, http, IID_API.to_string())
    }

    /// Same as [`TopicMembershipClient::new`] against a different IID host
    /// (emulators, tests).
    pub fn new_with_url(middleware: IidAuthMiddleware, http: Client, base_url: String) -> Self {
        let client = ClientBuilder::new(http).with(middleware).build();
        Self { client, base_url }
    }

    pub async fn subscribe(&self, device_token: &str, topic: &str) -> Result<(), MembershipError> {
        self.manage(device_token, topic, Method::POST).await
    }

    pub async fn unsubscribe(&self, device_token: &str, topic: &str) -> Result<(), MembershipError> {
        self.manage(device_token, topic, Method::DELETE).await
    }

    async fn manage(&self, device_token: &str, topic: &str, method: Method) -> Result<(), MembershipError> {
        let token = DeviceRegistrationToken::parse(device_token)
            .ok_or_else(|| MembershipError::InvalidInput("Token and topic are required".to_string()))?;
        let topic = normalize_topic(topic)?;

        let url = self.relation_url(&token, &topic)?;
        tracing::debug!(%method, topic = %topic, "updating topic membership");

        let response = self.client.request(method.clone(), url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(%method, topic = %topic, status = status.as_u16(), body = %text, "topic membership rejected");
            return Err(MembershipError::ProviderRejected(status.as_u16(), text));
        }

        tracing::info!(%method, topic = %topic, "topic membership updated");
        Ok(())
    }

    fn relation_url(&self, token: &DeviceRegistrationToken, topic: &str) -> Result<Url, MembershipError> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| MembershipError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(["iid", "v1", token.as_str(), "rel", "topics", topic]);
        Ok(url)
    }
}

/// Trims, strips a leading `/topics/` and checks the FCM topic alphabet.
pub fn normalize_topic(topic: &str) -> Result<String, MembershipError> {
    let trimmed = topic.trim();
    let name = trimmed.strip_prefix("/topics/").unwrap_or(trimmed);

    if name.is_empty() {
        return Err(MembershipError::InvalidInput("Token and topic are required".to_string()));
    }

    let valid = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~' | '%'));
    if !valid {
        return Err(MembershipError::InvalidInput(format!(
            "Topic name {:?} may only contain letters, digits and -_.~%",
            name
        )));
    }

    Ok(name.to_string())
}
