//! Lifecycle-specific error types

use crate::error::BoxError;
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Outcome of a single managed service's start attempt
#[derive(Debug, Error)]
pub enum StartError {
    /// The service's own `start` returned an error
    #[error("service `{service}` failed: {source}")]
    Failed {
        /// Name of the service that failed
        service: String,
        /// Error reported by the service
        #[source]
        source: BoxError,
    },

    /// The task running the service's `start` panicked
    #[error("service `{service}` panicked while running")]
    Panicked {
        /// Name of the service that panicked
        service: String,
    },

    /// The coordinator asked the service to stop while it was running
    #[error("service `{service}` stopped by cancellation")]
    StoppedByCancellation {
        /// Name of the cancelled service
        service: String,
    },
}

impl StartError {
    /// Whether this outcome is expected and must not be surfaced as a failure
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::StoppedByCancellation { .. })
    }

    /// Name of the service this outcome belongs to
    pub fn service(&self) -> &str {
        match self {
            Self::Failed { service, .. }
            | Self::Panicked { service }
            | Self::StoppedByCancellation { service } => service,
        }
    }
}

/// Outcome of a single managed service's graceful stop
#[derive(Debug, Error)]
pub enum StopError {
    /// The service already ended on its own before the stop was requested
    #[error("service `{service}` already terminated")]
    AlreadyTerminated {
        /// Name of the service
        service: String,
    },

    /// A stop for this service was already requested
    #[error("service `{service}` is already shutting down")]
    AlreadyShuttingDown {
        /// Name of the service
        service: String,
    },

    /// The service's own `gracefully_stop` returned an error
    #[error("service `{service}` failed to stop: {source}")]
    Failed {
        /// Name of the service
        service: String,
        /// Error reported by the service
        #[source]
        source: BoxError,
    },

    /// The service did not stop before the shared shutdown deadline
    #[error("service `{service}` did not stop before the shutdown deadline")]
    DeadlineExceeded {
        /// Name of the service
        service: String,
    },
}

impl StopError {
    /// Whether this outcome is expected and must not be surfaced as a failure
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            Self::AlreadyTerminated { .. } | Self::AlreadyShuttingDown { .. }
        )
    }

    /// Name of the service this outcome belongs to
    pub fn service(&self) -> &str {
        match self {
            Self::AlreadyTerminated { service }
            | Self::AlreadyShuttingDown { service }
            | Self::Failed { service, .. }
            | Self::DeadlineExceeded { service } => service,
        }
    }
}

/// Error returned by [`Coordinator::start`](super::Coordinator::start)
#[derive(Debug, Error)]
pub enum StartAggregateError {
    /// The first genuine failure observed among the running services
    #[error("a service went down: {0}")]
    ServiceFailed(#[source] StartError),

    /// `start` was already called on this coordinator
    #[error("coordinator already started")]
    AlreadyStarted,
}

impl StartAggregateError {
    /// Find the first error of type `E` in the source chain
    pub fn find_cause<E: StdError + 'static>(&self) -> Option<&E> {
        find_in_chain(self)
    }

    /// Whether an error of type `E` is wrapped by this error
    pub fn is<E: StdError + 'static>(&self) -> bool {
        self.find_cause::<E>().is_some()
    }
}

/// Error returned by [`Coordinator::gracefully_shutdown`](super::Coordinator::gracefully_shutdown)
///
/// Carries every genuine per-service failure in the order the services
/// finished. Benign outcomes never appear here.
#[derive(Debug)]
pub struct ShutdownAggregateError {
    failures: Vec<StopError>,
}

impl fmt::Display for ShutdownAggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} service(s) failed to shut down, first: {}",
            self.failures.len(),
            self.first()
        )
    }
}

impl StdError for ShutdownAggregateError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.first())
    }
}

impl ShutdownAggregateError {
    /// Build from a non-empty list of genuine failures
    pub(crate) fn new(failures: Vec<StopError>) -> Option<Self> {
        if failures.is_empty() {
            None
        } else {
            Some(Self { failures })
        }
    }

    /// The failure that completed first
    pub fn first(&self) -> &StopError {
        &self.failures[0]
    }

    /// All genuine failures
    pub fn failures(&self) -> &[StopError] {
        &self.failures
    }

    /// Find the first error of type `E` in any failure's source chain
    pub fn find_cause<E: StdError + 'static>(&self) -> Option<&E> {
        self.failures.iter().find_map(|f| find_in_chain(f))
    }

    /// Whether an error of type `E` is wrapped by any failure
    pub fn is<E: StdError + 'static>(&self) -> bool {
        self.find_cause::<E>().is_some()
    }
}

fn find_in_chain<'a, E: StdError + 'static>(err: &'a (dyn StdError + 'static)) -> Option<&'a E> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(found) = e.downcast_ref::<E>() {
            return Some(found);
        }
        current = e.source();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn test_start_error_chain_reaches_service_error() {
        let err = StartAggregateError::ServiceFailed(StartError::Failed {
            service: "api".into(),
            source: Box::new(Boom),
        });

        assert!(err.is::<Boom>());
        assert!(err.is::<StartError>());
        assert!(!err.is::<std::io::Error>());
        assert_eq!(err.to_string(), "a service went down: service `api` failed: boom");
    }

    #[test]
    fn test_benign_classification() {
        assert!(
            StartError::StoppedByCancellation {
                service: "a".into()
            }
            .is_benign()
        );
        assert!(!StartError::Panicked { service: "a".into() }.is_benign());
        assert!(StopError::AlreadyTerminated { service: "a".into() }.is_benign());
        assert!(StopError::AlreadyShuttingDown { service: "a".into() }.is_benign());
        assert!(!StopError::DeadlineExceeded { service: "a".into() }.is_benign());
    }

    #[test]
    fn test_shutdown_aggregate_requires_failures() {
        assert!(ShutdownAggregateError::new(Vec::new()).is_none());

        let err = ShutdownAggregateError::new(vec![
            StopError::DeadlineExceeded {
                service: "slow".into(),
            },
            StopError::Failed {
                service: "broken".into(),
                source: Box::new(Boom),
            },
        ])
        .unwrap();

        assert_eq!(err.failures().len(), 2);
        assert_eq!(err.first().service(), "slow");
        assert!(err.is::<Boom>());
        assert!(err.to_string().starts_with("2 service(s) failed to shut down"));
    }
}
