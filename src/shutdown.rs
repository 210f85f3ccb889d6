//! Release the store connection when the process is asked to stop

use tokio::task::JoinHandle;

use crate::database::Connector;

/// Exit code after a clean disconnect
pub const EXIT_OK: i32 = 0;
/// Exit code when closing the connection failed
pub const EXIT_FAILURE: i32 = 1;

/// Background task that disconnects and exits on SIGINT or SIGTERM.
///
/// In-flight requests are not drained. Dropping the hook uninstalls it.
pub struct ShutdownHook {
    task: JoinHandle<()>,
}

impl ShutdownHook {
    pub fn install(connector: Connector) -> Self {
        let task = tokio::spawn(async move {
            let signal = match wait_for_signal().await {
                Ok(signal) => signal,
                Err(e) => {
                    tracing::error!("Failed to listen for shutdown signals: {}", e);
                    return;
                }
            };

            tracing::info!(signal, "Shutdown signal received");
            let code = release(&connector).await;
            std::process::exit(code);
        });

        Self { task }
    }
}

impl Drop for ShutdownHook {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Resolve with the name of the first termination signal received
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|_| "SIGINT"),
            _ = terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map(|_| "SIGINT")
    }
}

/// Disconnect and pick the process exit code
pub async fn release(connector: &Connector) -> i32 {
    match connector.disconnect().await {
        Ok(()) => {
            tracing::info!("MongoDB connection closed through app termination");
            EXIT_OK
        }
        Err(e) => {
            tracing::error!("Error during MongoDB shutdown: {}", e);
            EXIT_FAILURE
        }
    }
}
