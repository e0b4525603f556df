//! Process lifecycle: logging and the shutdown signal.

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Initialize logging with tracing_subscriber.
///
/// `RUST_LOG` directives win; otherwise `info` with quiet sqlx.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .with_target(false)
        .with_ansi(true)
        .init();
}

/// A token cancelled on the first Ctrl-C.
pub fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown requested, finishing the current batch");
                trigger.cancel();
            }
            Err(e) => tracing::warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });
    token
}
