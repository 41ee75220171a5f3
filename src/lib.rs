//! Operator console for Firebase Cloud Messaging.
//!
//! Keeps one uploaded service account key, mints short-lived admin access
//! tokens from it and manages device topic subscriptions through the Instance
//! ID API. The `server` feature adds the HTTP surface in [`api`].

pub mod config;
pub mod core;
pub mod credentials;
pub mod logging;
pub mod messaging;
pub mod token;

#[cfg(feature = "server")]
pub mod api;

#[cfg(test)]
mod test_support;

use crate::core::middleware::{IidAuth, IidAuthMiddleware};
use credentials::CredentialStore;
use messaging::TopicMembershipClient;
use std::sync::Arc;
use token::TokenSession;

/// Entry point bundling a credential store with the clients built on top of it.
pub struct FirebaseConsole {
    store: Arc<dyn CredentialStore>,
    http: reqwest::Client,
}

impl FirebaseConsole {
    pub fn new(store: Arc<dyn CredentialStore>, http: reqwest::Client) -> Self {
        Self { store, http }
    }

    pub fn store(&self) -> Arc<dyn CredentialStore> {
        self.store.clone()
    }

    /// Starts an operator session; its presence flag reflects the store as it is now.
    pub async fn session(&self) -> TokenSession {
        TokenSession::new(self.store.clone(), self.http.clone()).await
    }

    pub fn topics(&self, auth: IidAuth) -> TopicMembershipClient {
        TopicMembershipClient::new(IidAuthMiddleware::new(auth), self.http.clone())
    }

    /// Topic client against a non-default Instance ID host.
    pub fn topics_with_url(&self, auth: IidAuth, base_url: String) -> TopicMembershipClient {
        TopicMembershipClient::new_with_url(IidAuthMiddleware::new(auth), self.http.clone(), base_url)
    }
}
