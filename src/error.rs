use crate::lifecycle::{ShutdownAggregateError, StartAggregateError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by [`Service`](crate::lifecycle::Service) implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Sentinel a service may return from `start` once its own stop path closed it.
///
/// The coordinator treats it exactly like `Ok(())`.
#[derive(Debug, Clone, Copy, Default, Error)]
#[error("server closed")]
pub struct ServerClosed;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration value for {key}: {message}")]
    Config { key: String, message: String },

    #[error(transparent)]
    Start(#[from] StartAggregateError),

    #[error(transparent)]
    Shutdown(#[from] ShutdownAggregateError),
}

impl Error {
    pub(crate) fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            key: key.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{Coordinator, StopError};
    use tokio_util::sync::CancellationToken;

    async fn start_twice(coordinator: &Coordinator) -> Result<()> {
        let cancel = CancellationToken::new();
        coordinator.start(&cancel).await?;
        coordinator.start(&cancel).await?;
        Ok(())
    }

    fn check_shutdown(failures: Vec<StopError>) -> Result<()> {
        ShutdownAggregateError::new(failures).map_or(Ok(()), Err)?;
        Ok(())
    }

    #[tokio::test]
    async fn test_start_error_converts() {
        let err = start_twice(&Coordinator::new()).await.unwrap_err();
        assert!(matches!(err, Error::Start(StartAggregateError::AlreadyStarted)));
    }

    #[test]
    fn test_shutdown_error_converts() {
        assert!(check_shutdown(Vec::new()).is_ok());

        let err = check_shutdown(vec![StopError::DeadlineExceeded {
            service: "svc".into(),
        }])
        .unwrap_err();
        match &err {
            Error::Shutdown(shutdown) => {
                assert_eq!(shutdown.failures().len(), 1);
                assert_eq!(err.to_string(), shutdown.to_string());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
