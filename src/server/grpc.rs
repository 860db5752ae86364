use super::{AdapterError, ServeControl};
use crate::error::BoxError;
use crate::lifecycle::Service;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};
use tokio::net::TcpListener;
use tokio::time::Instant;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::server::Router;

/// Serves a tonic [`Router`] on a bound listener
///
/// Build the router as usual with `Server::builder().add_service(..)`;
/// the adapter owns serving and draining it.
pub struct GrpcServer {
    name: String,
    local_addr: Option<SocketAddr>,
    parts: Mutex<Option<(Router, TcpListener)>>,
    control: ServeControl,
}

impl GrpcServer {
    pub fn new(router: Router, listener: TcpListener) -> Self {
        let local_addr = listener.local_addr().ok();
        let name = match local_addr {
            Some(addr) => format!("grpc@{addr}"),
            None => "grpc".to_string(),
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
impl Service for GrpcServer {
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

        tracing::info!(server = %self.name, address = ?self.local_addr, "gRPC server starting");

        router
            .serve_with_incoming_shutdown(
                TcpListenerStream::new(listener),
                self.control.shutdown_signal(self.name.clone(), cancel),
            )
            .await
            .map_err(AdapterError::Transport)?;

        tracing::info!(server = %self.name, "gRPC server stopped");
        Ok(())
    }

    async fn gracefully_stop(&self, deadline: Instant) -> Result<(), BoxError> {
        self.control.stop(deadline).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tonic::service::Routes;
    use tonic::transport::Server;

    async fn server() -> GrpcServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        GrpcServer::new(Server::builder().add_routes(Routes::default()), listener)
    }

    #[tokio::test]
    async fn test_serves_until_gracefully_stopped() {
        let server = Arc::new(server().await);
        let addr = server.local_addr().unwrap();
        assert_eq!(server.name(), format!("grpc@{addr}"));

        let running = Arc::clone(&server);
        let serve = tokio::spawn(async move { running.start(CancellationToken::new()).await });

        // The listener accepts connections while serving.
        tokio::net::TcpStream::connect(addr).await.unwrap();

        server
            .gracefully_stop(Instant::now() + Duration::from_secs(5))
            .await
            .unwrap();
        assert!(serve.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_stop_before_start() {
        let server = server().await.with_name("rpc");
        assert_eq!(server.name(), "rpc");

        server
            .gracefully_stop(Instant::now() + Duration::from_secs(1))
            .await
            .unwrap();

        // The serve loop sees the pending stop and returns at once.
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            server.start(CancellationToken::new()),
        )
        .await
        .unwrap();
        assert!(outcome.is_ok());
    }
}
