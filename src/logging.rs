//! Logging initialization with file output support

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Used when `RUST_LOG` is unset. The SSH stack is chatty at `info`.
const DEFAULT_DIRECTIVES: &str = "info,russh=warn,russh_sftp=warn";

const LOG_FILE_NAME: &str = "sftp-relay.log";

/// Initialize logging, optionally mirroring to a daily rolling file in
/// `log_dir`. Returns a guard that must be kept alive for the duration of
/// the program or buffered file output is lost.
pub fn init_logging(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let console_layer = fmt::layer().with_target(true).with_thread_ids(false);

    let Some(dir) = log_dir else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();
        return None;
    };

    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();
        tracing::warn!(
            "Log directory {} unavailable, logging to console only: {}",
            dir.display(),
            e
        );
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(&dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::debug!("Writing logs to {}", dir.join(LOG_FILE_NAME).display());
    Some(guard)
}
