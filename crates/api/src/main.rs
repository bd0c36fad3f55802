use anyhow::Context;

use cad_api::app::{build_app, services};
use cad_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cad_observability::init();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    let accounts = services::in_memory_accounts(&config)?;
    let app = build_app(&config, accounts);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind 0.0.0.0:{}", config.port))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        leo_policy = config.leo_policy.as_str(),
        "listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
