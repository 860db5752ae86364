//! Server adapters
//!
//! Ready-made [`Service`](crate::lifecycle::Service) implementations for an
//! axum HTTP router and a tonic gRPC router, each serving on a listener the
//! host already bound.

mod grpc;
mod http;

pub use grpc::GrpcServer;
pub use http::HttpServer;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Errors reported by the server adapters
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("server already started")]
    AlreadyStarted,

    #[error("server did not drain before the shutdown deadline")]
    DeadlineExceeded,

    #[error("I/O error while serving: {0}")]
    Io(#[from] std::io::Error),

    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

/// Stop request and drain notification shared by the adapters
#[derive(Debug, Default)]
struct ServeControl {
    stop: CancellationToken,
    finished: CancellationToken,
    started: AtomicBool,
}

impl ServeControl {
    /// Mark the serve loop as started; fails on a second call
    fn begin(&self) -> Result<DropGuard, AdapterError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(AdapterError::AlreadyStarted);
        }
        Ok(self.finished.clone().drop_guard())
    }

    /// Future the serve loop drains on: a stop request or `cancel`
    fn shutdown_signal(
        &self,
        name: String,
        cancel: CancellationToken,
    ) -> impl Future<Output = ()> + Send + 'static {
        let stop = self.stop.clone();
        async move {
            tokio::select! {
                _ = stop.cancelled() => {
                    tracing::info!(server = %name, "Stop requested, draining connections");
                }
                _ = cancel.cancelled() => {
                    tracing::info!(server = %name, "Cancelled, draining connections");
                }
            }
        }
    }

    /// Request the stop and wait for the serve loop to drain
    async fn stop(&self, deadline: Instant) -> Result<(), AdapterError> {
        self.stop.cancel();
        if !self.started.load(Ordering::Acquire) {
            return Ok(());
        }
        tokio::time::timeout_at(deadline, self.finished.cancelled())
            .await
            .map_err(|_| AdapterError::DeadlineExceeded)
    }
}
