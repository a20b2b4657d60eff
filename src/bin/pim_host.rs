//! Headless PIM host bridge binary for stdin/stdout JSON communication.
//!
//! Reads `CommandEnvelope` messages as newline-delimited JSON from stdin and
//! writes `ResponseEnvelope` messages to stdout.
//!
//! All tracing/diagnostic output goes to stderr (and a daily log file) so
//! that stdout remains a clean JSON protocol channel.

use std::path::PathBuf;
use std::sync::Arc;

use fae_pim::config::PimConfig;
use fae_pim::host::{HostCommandHandler, run_stdio_bridge};
use fae_pim::runtime::PimRuntime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Overrides the config file location.
const CONFIG_ENV: &str = "FAE_PIM_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = init_tracing();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "fae-pim-host starting");

    let config_path = std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(PimConfig::default_config_path);
    let config = PimConfig::load_or_default(&config_path).map_err(|e| {
        tracing::error!(error = %e, path = %config_path.display(), "failed to load config");
        anyhow::anyhow!("failed to load config from {}: {e}", config_path.display())
    })?;

    let runtime = Arc::new(PimRuntime::with_osascript(config));
    // Eager loading runs in the background; requests arriving meanwhile wait
    // for its outcome.
    let eager = runtime.start();

    run_stdio_bridge(HostCommandHandler::new(Arc::clone(&runtime)))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "fae-pim-host exited with error");
            anyhow::anyhow!("fae-pim-host failed: {e}")
        })?;

    eager.abort();
    tracing::info!("fae-pim-host shut down cleanly");
    Ok(())
}

/// Stderr plus a daily-rolling file under the logs directory.  The returned
/// guard flushes the file writer on drop.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let logs_dir = fae_pim::pim_dirs::logs_dir();
    match std::fs::create_dir_all(&logs_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(&logs_dir, "fae-pim-host.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false),
                )
                .init();
            Some(guard)
        }
        Err(e) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            tracing::warn!(error = %e, path = %logs_dir.display(), "file logging disabled");
            None
        }
    }
}
