//! Lifecycle Coordination Module
//!
//! This module runs several independently implemented services inside one
//! process so that they start together, fail together and shut down
//! together within a bounded time.
//!
//! # Lifecycle Phases
//!
//! ```text
//! 1. Registration (Coordinator::register)
//!    ↓
//! 2. Start (Coordinator::start)         ← every service on its own task
//!    ↓
//! [Running...]
//!    ↓                    ↘
//!    ↓                     a service fails → the others are cancelled,
//!    ↓                                       start returns its error
//! 3. Shutdown request (explicit call, SIGTERM/SIGINT)
//!    ↓
//! 4. Graceful stop (each service)       ← one shared deadline
//!    ↓
//! 5. Shutdown completion
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use multiserve::lifecycle::Coordinator;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! let coordinator = Coordinator::new()
//!     .register(api_server)
//!     .register(admin_server)
//!     .shutdown_timeout(Duration::from_secs(6))
//!     .enable_shutdown_on_termination_signal();
//!
//! if let Err(e) = coordinator.start(&CancellationToken::new()).await {
//!     tracing::error!("A server went down: {}", e);
//! }
//! coordinator.wait_for_shutdown_completion().await;
//! ```

mod coordinator;
mod error;
mod flag;
mod managed;
mod signal;
mod traits;

pub use coordinator::{Coordinator, ServiceStatus, ShutdownOutcome};
pub use error::{ShutdownAggregateError, StartAggregateError, StartError, StopError};
pub use flag::ShutdownFlag;
pub use signal::termination_signal;
pub use traits::Service;
