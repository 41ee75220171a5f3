use anyhow::Context;
use fcm_admin_console::api::{self, ConsoleState};
use fcm_admin_console::config::AppConfig;
use fcm_admin_console::logging;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = AppConfig::load().context("failed to load configuration")?;
    let state = ConsoleState::from_config(&config)
        .await
        .context("failed to build HTTP client")?;

    if !state.session.has_credential().await {
        tracing::warn!(
            path = %config.credentials.path,
            "no service account stored yet; upload one before generating tokens"
        );
    }

    let app = api::app(state, config.server.max_upload_bytes);

    let listener = TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_addr))?;
    tracing::info!(addr = %config.server.bind_addr, "console listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
