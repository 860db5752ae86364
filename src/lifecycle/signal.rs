//! Signal Bridge
//!
//! Turns a shutdown trigger (by default SIGINT/SIGTERM) into a coordinator
//! shutdown and lets callers wait for it to finish.

use std::future::Future;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Background listener owned by a single coordinator
///
/// Waits for `trigger`, runs the shutdown, then marks completion. The
/// listener task is aborted when the bridge is dropped.
pub(crate) struct SignalBridge {
    completed: CancellationToken,
    listener: JoinHandle<()>,
}

impl SignalBridge {
    pub(crate) fn spawn<T, S>(trigger: T, shutdown: S) -> Self
    where
        T: Future<Output = ()> + Send + 'static,
        S: Future<Output = ()> + Send + 'static,
    {
        let completed = CancellationToken::new();
        let done = completed.clone();

        let listener = tokio::spawn(async move {
            trigger.await;
            tracing::info!("Starting graceful shutdown on request...");
            shutdown.await;
            done.cancel();
            tracing::info!("Shutdown sequence finished");
        });

        Self {
            completed,
            listener,
        }
    }

    /// Wait until the triggered shutdown finished
    pub(crate) async fn wait(&self) {
        self.completed.cancelled().await;
    }
}

impl Drop for SignalBridge {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Completes when the process receives Ctrl+C or SIGTERM
///
/// A handler that cannot be installed is logged and never fires.
///
/// # Example
///
/// ```rust,ignore
/// use multiserve::lifecycle::termination_signal;
///
/// tokio::select! {
///     _ = termination_signal() => {
///         println!("Shutdown signal received");
///     }
///     _ = server.serve() => {}
/// }
/// ```
pub async fn termination_signal() {
    TerminationSignal::install().recv().await;
}

/// SIGINT/SIGTERM handlers installed at construction
///
/// Once installed, a signal no longer terminates the process; it is
/// delivered to [`recv`](Self::recv) instead, even if it arrives before the
/// first poll.
pub(crate) struct TerminationSignal {
    #[cfg(unix)]
    interrupt: Option<signal::unix::Signal>,
    #[cfg(unix)]
    terminate: Option<signal::unix::Signal>,
}

impl TerminationSignal {
    /// Must be called inside a Tokio runtime
    pub(crate) fn install() -> Self {
        Self {
            #[cfg(unix)]
            interrupt: install_handler(signal::unix::SignalKind::interrupt(), "Ctrl+C"),
            #[cfg(unix)]
            terminate: install_handler(signal::unix::SignalKind::terminate(), "SIGTERM"),
        }
    }

    /// Completes on the first SIGINT or SIGTERM
    pub(crate) async fn recv(self) {
        #[cfg(unix)]
        {
            let Self {
                interrupt,
                terminate,
            } = self;

            tokio::select! {
                _ = recv_on(interrupt) => {
                    tracing::info!("Received Ctrl+C signal");
                },
                _ = recv_on(terminate) => {
                    tracing::info!("Received SIGTERM signal");
                },
            }
        }

        #[cfg(not(unix))]
        {
            let Self {} = self;
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Received Ctrl+C signal");
        }
    }
}

#[cfg(unix)]
fn install_handler(kind: signal::unix::SignalKind, label: &str) -> Option<signal::unix::Signal> {
    match signal::unix::signal(kind) {
        Ok(stream) => Some(stream),
        Err(e) => {
            tracing::error!("Failed to install {} handler: {}", label, e);
            None
        }
    }
}

/// A missing handler never fires
#[cfg(unix)]
async fn recv_on(stream: Option<signal::unix::Signal>) {
    match stream {
        Some(mut stream) => {
            stream.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}
