use super::{AdapterError, ServeControl};
use crate::error::BoxError;
use crate::lifecycle::Service;
use async_trait::async_trait;
use axum::Router;
use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};
use tokio::net::TcpListener;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Serves an axum [`Router`] on a bound listener
///
/// `start` returns `Ok(())` once the server drained after
/// [`gracefully_stop`](Service::gracefully_stop) or after the coordinator
/// cancelled it.
pub struct HttpServer {
    name: String,
    local_addr: Option<SocketAddr>,
    parts: Mutex<Option<(Router, TcpListener)>>,
    control: ServeControl,
}

impl HttpServer {
    pub fn new(router: Router, listener: TcpListener) -> Self {
        let local_addr = listener.local_addr().ok();
        let name = match local_addr {
            Some(addr) => format!("http@{addr}"),
            None => "http".to_string(),
        };
        Self {
            name,
            local_addr,
            parts: Mutex::new(Some((router, listener))),
            control: ServeControl::default(),
        }
    }

    /// Override the name used in logs and errors
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

#[async_trait]
impl Service for HttpServer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, cancel: CancellationToken) -> Result<(), BoxError> {
        let _finished = self.control.begin()?;
        let Some((router, listener)) = self
            .parts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return Err(AdapterError::AlreadyStarted.into());
        };

        tracing::info!(server = %self.name, address = ?self.local_addr, "HTTP server starting");

        axum::serve(listener, router)
            .with_graceful_shutdown(self.control.shutdown_signal(self.name.clone(), cancel))
            .await
            .map_err(AdapterError::Io)?;

        tracing::info!(server = %self.name, "HTTP server stopped");
        Ok(())
    }

    async fn gracefully_stop(&self, deadline: Instant) -> Result<(), BoxError> {
        self.control.stop(deadline).await?;
        Ok(())
    }
}
