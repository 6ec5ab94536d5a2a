use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
/// Conventional exit code for a process ended by SIGINT.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Spawns a background task that cancels the run token on SIGINT or
/// SIGTERM. In-flight table workers stop at their next batch boundary,
/// no further levels are dispatched, the warden re-enables whatever it
/// suspended, and the run-result file is finalized. An interrupted run
/// can be resumed with --start-row --order-by-pk.
pub fn listen_for_shutdown(cancel: CancellationToken) {
    tokio::spawn(async move {
        let signal_name = shutdown_signal().await;
        info!(
            "{signal_name} received; letting current batches commit, \
             then finalizing the run-result file"
        );
        cancel.cancel();
    });
}

async fn shutdown_signal() -> &'static str {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation failed");
        tokio::select! {
            _ = signal::ctrl_c() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .expect("SIGINT handler installation failed");
        "SIGINT"
    }
}
