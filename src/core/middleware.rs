use crate::token::TokenSession;
use http::Extensions;
use reqwest::{header, Request, Response};
use reqwest_middleware::{Middleware, Next};
use std::sync::Arc;

/// How requests to the Instance ID API are authorized.
#[derive(Clone)]
pub enum IidAuth {
    /// Legacy FCM server key, sent as `Authorization: key=...`.
    ServerKey(String),
    /// A bearer token from the operator's session: the tracked token while it
    /// is active, otherwise one freshly minted from the uploaded key. Stops
    /// working once the session is reset.
    ServiceAccount(Arc<TokenSession>),
}

#[derive(Clone)]
pub struct IidAuthMiddleware {
    auth: IidAuth,
}

impl IidAuthMiddleware {
    pub fn new(auth: IidAuth) -> Self {
        Self { auth }
    }

    async fn authorization(&self) -> Result<String, anyhow::Error> {
        match &self.auth {
            IidAuth::ServerKey(key) => Ok(format!("key={}", key)),
            IidAuth::ServiceAccount(session) => {
                let token = session.bearer_token().await?;
                Ok(format!("Bearer {}", token))
            }
        }
    }
}

#[async_trait::async_trait]
impl Middleware for IidAuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let authorization = self.authorization().await.map_err(|e| {
            reqwest_middleware::Error::Middleware(anyhow::anyhow!("Failed to authorize IID request: {}", e))
        })?;

        let value = header::HeaderValue::from_str(&authorization).map_err(|e| {
            reqwest_middleware::Error::Middleware(anyhow::anyhow!("Invalid authorization header: {}", e))
        })?;
        req.headers_mut().insert(header::AUTHORIZATION, value);

        // IID only honours OAuth2 bearer tokens when this flag is present.
        if matches!(self.auth, IidAuth::ServiceAccount(_)) {
            req.headers_mut()
                .insert("access_token_auth", header::HeaderValue::from_static("true"));
        }

        next.run(req, extensions).await
    }
}
