pub mod run;
pub mod tail;

use tokio_util::sync::CancellationToken;

/// Токен, который отменяется по Ctrl+C.
pub(crate) fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("shutting down...");
                signal_token.cancel();
            }
            Err(e) => tracing::error!(error = %e, "ctrl-c handler unavailable"),
        }
    });
    token
}
