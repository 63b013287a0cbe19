use std::sync::Arc;

use anyhow::Context;

use sftp_relay::config::AppConfig;
use sftp_relay::session::SessionRegistry;
use sftp_relay::sftp::SftpConnector;
use sftp_relay::transfer::TransferEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with file output.
    let log_dir = sftp_relay::config::paths::ensure_log_dir().ok();
    let _guard = sftp_relay::logging::init_logging(log_dir);

    let config = AppConfig::load().context("Failed to load configuration")?;

    tracing::info!("Starting SFTP relay");
    if let Some(path) = sftp_relay::config::paths::config_file() {
        tracing::info!("Using config {}", path.display());
    }

    let connector = Arc::new(SftpConnector::new(config.connect_settings()));
    let registry = SessionRegistry::new(connector, config.session_settings());
    registry.start_sweeper();

    let engine = TransferEngine::new(config.transfer_settings());
    tracing::info!(
        max_sessions = registry.settings().max_sessions,
        timeout_secs = registry.settings().timeout.as_secs(),
        max_preview_bytes = engine.settings().max_preview_bytes,
        archive_name = %engine.settings().archive_name,
        "Session registry ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    tracing::info!("Shutdown requested");
    registry.shutdown().await;
    Ok(())
}
