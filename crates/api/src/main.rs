use anyhow::Context;

use stockledger_api::app;
use stockledger_api::config::{AppConfig, secret_var};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    stockledger_observability::init(config.log_format);

    for role in &config.insecure_roles {
        tracing::warn!(%role, var = secret_var(*role), "signing secret not set; using insecure dev default");
    }

    let ledger = app::services::build_ledger(config.ledger.clone())
        .await
        .context("failed to initialise inventory store")?;
    let app = app::build_app(ledger, config.keys.clone());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
