//! Managed Service
//!
//! Wraps one [`Service`] with the bookkeeping the coordinator needs: whether
//! the service already ended on its own, and whether its stop was already
//! requested.

use super::{Service, ShutdownFlag, StartError, StopError};
use crate::error::{BoxError, ServerClosed};
use std::sync::{Arc, OnceLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How the wrapped service's `start` ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Termination {
    Clean,
    Failed(String),
}

pub(crate) struct ManagedService {
    inner: Arc<dyn Service>,
    name: String,
    shutdown: ShutdownFlag,
    terminated: Arc<OnceLock<Termination>>,
}

impl ManagedService {
    pub(crate) fn new(service: Arc<dyn Service>) -> Self {
        let name = service.name().to_string();
        Self {
            inner: service,
            name,
            shutdown: ShutdownFlag::new(),
            terminated: Arc::new(OnceLock::new()),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Run the wrapped service until it returns or `cancel` fires
    ///
    /// The wrapped `start` runs on its own task. If `cancel` wins the race the
    /// task keeps running and still records how it ended once it finishes.
    pub(crate) async fn start(&self, cancel: CancellationToken) -> Result<(), StartError> {
        let inner = Arc::clone(&self.inner);
        let terminated = Arc::clone(&self.terminated);
        let name = self.name.clone();
        let service_cancel = cancel.clone();

        tracing::debug!(service = %self.name, "Starting service");

        let mut task = tokio::spawn(async move {
            // Nested so a panic is recorded even after cancellation returned.
            let outcome = tokio::spawn(async move { inner.start(service_cancel).await })
                .await
                .map(normalize);
            let termination = match &outcome {
                Ok(Ok(())) => Termination::Clean,
                Ok(Err(e)) => Termination::Failed(e.to_string()),
                Err(join_err) => Termination::Failed(join_err.to_string()),
            };
            tracing::debug!(service = %name, ?termination, "Service start returned");
            let _ = terminated.set(termination);
            outcome
        });

        tokio::select! {
            // The service's own outcome wins when both are ready.
            biased;
            joined = &mut task => match joined.and_then(|outcome| outcome) {
                Ok(Ok(())) => Ok(()),
                Ok(Err(source)) => Err(StartError::Failed {
                    service: self.name.clone(),
                    source,
                }),
                Err(join_err) => {
                    tracing::error!(service = %self.name, error = %join_err, "Service task panicked");
                    let _ = self
                        .terminated
                        .set(Termination::Failed(join_err.to_string()));
                    Err(StartError::Panicked {
                        service: self.name.clone(),
                    })
                }
            },
            _ = cancel.cancelled() => {
                tracing::debug!(service = %self.name, "Service stopped by cancellation");
                Err(StartError::StoppedByCancellation {
                    service: self.name.clone(),
                })
            }
        }
    }

    /// Ask the wrapped service to stop before `deadline`
    pub(crate) async fn gracefully_stop(&self, deadline: Instant) -> Result<(), StopError> {
        if let Some(termination) = self.terminated.get() {
            if let Termination::Failed(reason) = termination {
                tracing::debug!(service = %self.name, %reason, "Service already went down, skipping stop");
            }
            return Err(StopError::AlreadyTerminated {
                service: self.name.clone(),
            });
        }

        if !self.shutdown.initiate() {
            return Err(StopError::AlreadyShuttingDown {
                service: self.name.clone(),
            });
        }

        tracing::info!(service = %self.name, "Graceful stop initiated");

        match tokio::time::timeout_at(deadline, self.inner.gracefully_stop(deadline)).await {
            Ok(Ok(())) => {
                tracing::debug!(service = %self.name, "Service stopped");
                Ok(())
            }
            Ok(Err(source)) => Err(StopError::Failed {
                service: self.name.clone(),
                source,
            }),
            Err(_) => Err(StopError::DeadlineExceeded {
                service: self.name.clone(),
            }),
        }
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutdown.is_initiated()
    }

    pub(crate) fn has_terminated(&self) -> bool {
        self.terminated.get().is_some()
    }

    #[cfg(test)]
    pub(crate) fn termination(&self) -> Option<&Termination> {
        self.terminated.get()
    }
}

fn normalize(outcome: Result<(), BoxError>) -> Result<(), BoxError> {
    match outcome {
        Err(e) if e.is::<ServerClosed>() => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, thiserror::Error)]
    #[error("any error")]
    struct AnyErr;

    /// Sleeps for `run_for`, then ends as configured
    struct LoopService {
        run_for: Duration,
        fail: bool,
        closed: bool,
        panics: bool,
        stop_latency: Duration,
        stop_calls: Arc<AtomicUsize>,
    }

    impl LoopService {
        fn new(run_for: Duration) -> Self {
            Self {
                run_for,
                fail: false,
                closed: false,
                panics: false,
                stop_latency: Duration::ZERO,
                stop_calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Service for LoopService {
        fn name(&self) -> &str {
            "loop"
        }

        async fn start(&self, _cancel: CancellationToken) -> Result<(), BoxError> {
            tokio::time::sleep(self.run_for).await;
            if self.panics {
                panic!("loop service crashed");
            }
            if self.fail {
                Err(Box::new(AnyErr))
            } else if self.closed {
                Err(Box::new(ServerClosed))
            } else {
                Ok(())
            }
        }

        async fn gracefully_stop(&self, _deadline: Instant) -> Result<(), BoxError> {
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
            if !self.stop_latency.is_zero() {
                tokio::time::sleep(self.stop_latency).await;
            }
            Ok(())
        }
    }

    fn managed(service: LoopService) -> ManagedService {
        ManagedService::new(Arc::new(service))
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_wins_over_slow_start() {
        let m = managed(LoopService::new(Duration::from_secs(5)));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            trigger.cancel();
        });

        let err = m.start(cancel).await.unwrap_err();
        assert!(matches!(err, StartError::StoppedByCancellation { .. }));
        assert!(err.is_benign());

        // The losing branch still records its outcome.
        assert!(!m.has_terminated());
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(m.termination(), Some(&Termination::Clean));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_after_cancellation_is_recorded() {
        let mut service = LoopService::new(Duration::from_secs(5));
        service.panics = true;
        let stop_calls = Arc::clone(&service.stop_calls);
        let m = managed(service);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let err = m.start(cancel).await.unwrap_err();
        assert!(matches!(err, StartError::StoppedByCancellation { .. }));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(matches!(m.termination(), Some(Termination::Failed(_))));

        let err = m
            .gracefully_stop(Instant::now() + Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StopError::AlreadyTerminated { .. }));
        assert_eq!(stop_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_is_reported() {
        let mut service = LoopService::new(Duration::from_millis(10));
        service.panics = true;
        let m = managed(service);

        let err = m.start(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, StartError::Panicked { .. }));
        assert!(matches!(m.termination(), Some(Termination::Failed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_error_is_returned() {
        let mut service = LoopService::new(Duration::from_secs(5));
        service.fail = true;
        let m = managed(service);

        let err = m.start(CancellationToken::new()).await.unwrap_err();
        match &err {
            StartError::Failed { service, source } => {
                assert_eq!(service, "loop");
                assert!(source.is::<AnyErr>());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(
            m.termination(),
            Some(&Termination::Failed("any error".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_closed_is_success() {
        let mut service = LoopService::new(Duration::from_millis(10));
        service.closed = true;
        let m = managed(service);

        assert!(m.start(CancellationToken::new()).await.is_ok());
        assert_eq!(m.termination(), Some(&Termination::Clean));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_after_termination_skips_inner_stop() {
        let service = LoopService::new(Duration::from_millis(10));
        let stop_calls = Arc::clone(&service.stop_calls);
        let m = managed(service);

        m.start(CancellationToken::new()).await.unwrap();

        let err = m
            .gracefully_stop(Instant::now() + Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StopError::AlreadyTerminated { .. }));
        assert_eq!(stop_calls.load(Ordering::SeqCst), 0);
        assert!(!m.is_shutting_down());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_stop_is_already_shutting_down() {
        let service = LoopService::new(Duration::from_secs(3600));
        let stop_calls = Arc::clone(&service.stop_calls);
        let m = managed(service);
        let deadline = Instant::now() + Duration::from_secs(1);

        m.gracefully_stop(deadline).await.unwrap();
        assert!(m.is_shutting_down());

        let err = m.gracefully_stop(deadline).await.unwrap_err();
        assert!(matches!(err, StopError::AlreadyShuttingDown { .. }));
        assert_eq!(stop_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_respects_deadline() {
        let mut service = LoopService::new(Duration::from_secs(3600));
        service.stop_latency = Duration::from_secs(10);
        let m = managed(service);

        let started = Instant::now();
        let err = m
            .gracefully_stop(started + Duration::from_secs(2))
            .await
            .unwrap_err();

        assert!(matches!(err, StopError::DeadlineExceeded { .. }));
        assert!(!err.is_benign());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3));
    }
}
