use super::{load_or_create_config, logging};
use quarantine::bot::VerifyBot;
use quarantine::gatekeeper::VerifyContext;
use quarantine::gateway::OneBotGateway;
use quarantine::server;
use quarantine::store::SqliteRecordStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Run the bot service
///
/// Loads (or generates) the config, opens the record database, connects the
/// OneBot HTTP API and serves:
/// - `GET /unban?qq=<id>` when HTTP self-unlock is enabled
/// - `POST /onebot` for signed join notices and `/verify` commands
///
/// Runs until the listener fails or the process receives Ctrl-C.
pub async fn execute(config_path: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let (config_path, config) = load_or_create_config(config_path)?;
    logging::init(&config.logging)?;

    info!(config = %config_path.display(), "starting quarantine bot");
    if config.verify.operators.is_empty() {
        tracing::warn!("no operators configured; /verify commands will be refused");
    }
    if config.onebot.secret.is_none() {
        tracing::warn!("no onebot.secret configured; the /onebot event webhook is disabled");
    }

    let addr: SocketAddr = config.http.bind.parse()?;
    let store = Arc::new(SqliteRecordStore::open(&config.storage.database).await?);
    info!(database = %config.storage.database.display(), "record store ready");

    let gateway = Arc::new(OneBotGateway::new(
        config.onebot.api_url.clone(),
        config.onebot.access_token.clone(),
    )?);

    let ctx = VerifyContext::new(store.clone(), gateway.clone(), gateway);
    let allow_http = config.verify.allow_http;
    let webhook_secret = config.onebot.secret.clone();
    let (bot, handle) = VerifyBot::new(ctx, Arc::new(config));
    let bot_task = tokio::spawn(bot.run());

    let app = server::router(handle, allow_http, webhook_secret.as_deref());
    tokio::select! {
        result = server::serve(addr, app) => result?,
        _ = tokio::signal::ctrl_c() => info!("shutdown requested"),
    }

    bot_task.abort();
    store.close().await;
    info!("quarantine bot stopped");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_rejects_bad_bind_address() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let database = temp_dir.path().join("quarantine.db");
        std::fs::write(
            &config_path,
            format!(
                "[http]\nbind = \"not-an-address\"\n\n[storage]\ndatabase = \"{}\"\n",
                database.display()
            ),
        )
        .unwrap();

        let result = execute(Some(config_path.to_string_lossy().to_string())).await;

        assert!(result.is_err());
        // fails before anything is opened
        assert!(!database.exists());
    }
}
