//! # Multiserve
//!
//! Run several long-lived network services inside one process so that they
//! start together, fail together and shut down together within a bounded
//! time.
//!
//! ## Features
//!
//! - **Concurrent start**: every registered service runs on its own task
//! - **Fail together**: the first service to go down cancels the others and
//!   its error is returned from `start`
//! - **Bounded graceful shutdown**: every service is stopped under one shared
//!   deadline, exactly once, however many callers ask for it
//! - **Signal handling**: optional SIGINT/SIGTERM triggered shutdown with a
//!   completion rendezvous
//! - **Adapters**: ready-made services for axum and tonic routers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use multiserve::lifecycle::Coordinator;
//! use multiserve::server::HttpServer;
//! use axum::{Router, routing::get};
//! use std::time::Duration;
//! use tokio::net::TcpListener;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let public = Router::new().route("/", get(|| async { "Hello, World" }));
//!     let admin = Router::new().route("/health", get(|| async { "ok" }));
//!
//!     let coordinator = Coordinator::new()
//!         .register(HttpServer::new(public, TcpListener::bind("0.0.0.0:8000").await?))
//!         .register(HttpServer::new(admin, TcpListener::bind("0.0.0.0:8001").await?))
//!         .shutdown_timeout(Duration::from_secs(6))
//!         .enable_shutdown_on_termination_signal();
//!
//!     if let Err(e) = coordinator.start(&CancellationToken::new()).await {
//!         tracing::error!("A server went down: {}", e);
//!     }
//!     coordinator.wait_for_shutdown_completion().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod server;

// Re-export core types
pub use config::{ConfigService, CoordinatorConfig};
pub use error::{BoxError, Error, Result, ServerClosed};
pub use lifecycle::{Coordinator, Service, ShutdownOutcome};

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;

/// Prelude module for convenient imports
///
/// ```
/// use multiserve::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{ConfigService, CoordinatorConfig};
    pub use crate::error::{BoxError, Error, Result, ServerClosed};
    pub use crate::lifecycle::{
        Coordinator, Service, ServiceStatus, ShutdownAggregateError, ShutdownFlag,
        ShutdownOutcome, StartAggregateError, StartError, StopError, termination_signal,
    };
    pub use crate::server::{AdapterError, GrpcServer, HttpServer};
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
    pub use tokio::time::Instant;
    pub use tokio_util::sync::CancellationToken;
}
