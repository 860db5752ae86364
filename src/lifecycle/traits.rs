//! Service contract
//!
//! Any long-running unit the coordinator manages implements [`Service`].

use crate::error::BoxError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A long-running unit with start and graceful-stop capabilities
///
/// Both operations are called at most once over the service's lifetime.
///
/// # Example
///
/// ```rust,ignore
/// use multiserve::lifecycle::Service;
/// use multiserve::{BoxError, async_trait};
///
/// struct Ticker {
///     stop: CancellationToken,
/// }
///
/// #[async_trait]
/// impl Service for Ticker {
///     fn name(&self) -> &str {
///         "ticker"
///     }
///
///     async fn start(&self, cancel: CancellationToken) -> Result<(), BoxError> {
///         let mut interval = tokio::time::interval(Duration::from_secs(1));
///         loop {
///             tokio::select! {
///                 _ = cancel.cancelled() => return Ok(()),
///                 _ = self.stop.cancelled() => return Ok(()),
///                 _ = interval.tick() => tracing::info!("tick"),
///             }
///         }
///     }
///
///     async fn gracefully_stop(&self, _deadline: Instant) -> Result<(), BoxError> {
///         self.stop.cancel();
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Label used in logs and errors
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Run the service until it stops
    ///
    /// `cancel` fires when the coordinator wants every service to stop, for
    /// example because a sibling failed. A stop initiated through
    /// [`gracefully_stop`](Self::gracefully_stop) must end with `Ok(())` or
    /// [`ServerClosed`](crate::ServerClosed); anything else is a failure.
    async fn start(&self, cancel: CancellationToken) -> Result<(), BoxError>;

    /// Ask the service to stop, finishing in-flight work before `deadline`
    async fn gracefully_stop(&self, deadline: Instant) -> Result<(), BoxError>;
}

#[async_trait]
impl<S: Service + ?Sized> Service for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn start(&self, cancel: CancellationToken) -> Result<(), BoxError> {
        (**self).start(cancel).await
    }

    async fn gracefully_stop(&self, deadline: Instant) -> Result<(), BoxError> {
        (**self).gracefully_stop(deadline).await
    }
}
