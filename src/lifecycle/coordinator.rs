//! Coordinator
//!
//! Registers services, starts them together and shuts them down together.

use super::managed::ManagedService;
use super::signal::{SignalBridge, TerminationSignal};
use super::{
    Service, ShutdownAggregateError, ShutdownFlag, StartAggregateError, StartError, StopError,
};
use crate::config::CoordinatorConfig;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Successful result of [`Coordinator::gracefully_shutdown`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// This call ran the shutdown and every service stopped
    Completed,
    /// Another caller already initiated the shutdown; nothing was done
    AlreadyShuttingDown,
}

/// Point-in-time view of one registered service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    /// Service name
    pub name: String,
    /// Whether a graceful stop was requested for it
    pub shutting_down: bool,
    /// Whether its `start` already returned
    pub terminated: bool,
}

struct Registry {
    services: Vec<Arc<ManagedService>>,
    shutdown_timeout: Option<Duration>,
}

/// State shared between the coordinator and its signal bridge
struct Shared {
    registry: Mutex<Registry>,
    shutdown: ShutdownFlag,
    started: AtomicBool,
}

impl Shared {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn gracefully_shutdown(&self) -> Result<ShutdownOutcome, ShutdownAggregateError> {
        if !self.shutdown.initiate() {
            tracing::debug!("Shutdown already initiated, ignoring request");
            return Ok(ShutdownOutcome::AlreadyShuttingDown);
        }

        let (services, timeout) = {
            let registry = self.registry();
            (registry.services.clone(), registry.shutdown_timeout)
        };

        let timeout = timeout.unwrap_or_else(|| {
            tracing::warn!("No shutdown timeout configured, services get no time to stop");
            Duration::ZERO
        });
        let deadline = Instant::now() + timeout;

        tracing::info!(
            services = services.len(),
            timeout = ?timeout,
            "Starting graceful shutdown..."
        );

        let mut tasks = JoinSet::new();
        let mut names = HashMap::new();
        for service in services {
            let name = service.name().to_string();
            let handle = tasks.spawn(async move { service.gracefully_stop(deadline).await });
            names.insert(handle.id(), name);
        }

        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) if err.is_benign() => {
                    tracing::debug!(service = err.service(), "{}", err);
                }
                Ok(Err(err)) => {
                    tracing::error!(service = err.service(), error = %err, "Graceful stop failed");
                    failures.push(err);
                }
                Err(join_err) => {
                    let service = names.remove(&join_err.id()).unwrap_or_default();
                    tracing::error!(service = %service, error = %join_err, "Stop task panicked");
                    failures.push(StopError::Failed {
                        service,
                        source: Box::new(join_err),
                    });
                }
            }
        }

        match ShutdownAggregateError::new(failures) {
            Some(err) => Err(err),
            None => {
                tracing::info!("Graceful shutdown complete");
                Ok(ShutdownOutcome::Completed)
            }
        }
    }
}

/// Runs a set of services so that they start together, fail together and
/// shut down together
///
/// # Example
///
/// ```rust,ignore
/// use multiserve::lifecycle::Coordinator;
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// let coordinator = Coordinator::new()
///     .register(HttpServer::new(router, http_listener))
///     .register(GrpcServer::new(routes, grpc_listener))
///     .shutdown_timeout(Duration::from_secs(6))
///     .enable_shutdown_on_termination_signal();
///
/// if let Err(e) = coordinator.start(&CancellationToken::new()).await {
///     tracing::error!("A server went down: {}", e);
/// }
/// coordinator.wait_for_shutdown_completion().await;
/// ```
pub struct Coordinator {
    shared: Arc<Shared>,
    signal_bridge: Option<SignalBridge>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    /// Create a coordinator with no services and no shutdown timeout
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry {
                    services: Vec::new(),
                    shutdown_timeout: None,
                }),
                shutdown: ShutdownFlag::new(),
                started: AtomicBool::new(false),
            }),
            signal_bridge: None,
        }
    }

    /// Create a coordinator configured from `config`
    ///
    /// Enabling signal shutdown spawns a task, so with
    /// `shutdown_on_signal` set this must run inside a Tokio runtime.
    pub fn from_config(config: &CoordinatorConfig) -> Self {
        let mut coordinator = Self::new();
        if let Some(timeout) = config.shutdown_timeout {
            coordinator = coordinator.shutdown_timeout(timeout);
        }
        if config.shutdown_on_signal {
            coordinator = coordinator.enable_shutdown_on_termination_signal();
        }
        coordinator
    }

    /// Register a service
    ///
    /// Services can only be registered before [`start`](Self::start). Later
    /// registrations are rejected with a warning and the service is dropped.
    pub fn register<S: Service>(self, service: S) -> Self {
        let service: Arc<dyn Service> = Arc::new(service);
        let mut registry = self.shared.registry();
        if self.shared.started.load(Ordering::Acquire) {
            tracing::warn!(
                service = service.name(),
                "Coordinator already started, registration rejected"
            );
        } else {
            tracing::debug!(service = service.name(), "Registered service");
            registry.services.push(Arc::new(ManagedService::new(service)));
        }
        drop(registry);
        self
    }

    /// Set the window services get to stop during
    /// [`gracefully_shutdown`](Self::gracefully_shutdown)
    ///
    /// This is required in practice: without it the shutdown deadline
    /// expires immediately and only services that stop without waiting
    /// succeed.
    pub fn shutdown_timeout(self, timeout: Duration) -> Self {
        self.shared.registry().shutdown_timeout = Some(timeout);
        self
    }

    /// Number of registered services
    pub fn len(&self) -> usize {
        self.shared.registry().services.len()
    }

    /// Whether no service has been registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Status of every registered service, in registration order
    pub fn statuses(&self) -> Vec<ServiceStatus> {
        self.shared
            .registry()
            .services
            .iter()
            .map(|service| ServiceStatus {
                name: service.name().to_string(),
                shutting_down: service.is_shutting_down(),
                terminated: service.has_terminated(),
            })
            .collect()
    }

    /// Start every registered service and wait until all of them ended
    ///
    /// Each service runs on its own task and observes a child of `parent`.
    /// The first service to fail cancels that child so the others stop, and
    /// its error is returned. When several fail at about the same time the
    /// reported one is whichever finished first, not the earliest
    /// registered. Cancelling `parent` is not a failure.
    pub async fn start(&self, parent: &CancellationToken) -> Result<(), StartAggregateError> {
        let services = {
            let registry = self.shared.registry();
            if self.shared.started.swap(true, Ordering::AcqRel) {
                return Err(StartAggregateError::AlreadyStarted);
            }
            registry.services.clone()
        };

        let scope = parent.child_token();
        let _scope_guard = scope.clone().drop_guard();

        tracing::info!(services = services.len(), "Starting services...");

        let mut tasks = JoinSet::new();
        let mut names = HashMap::new();
        for service in services {
            let cancel = scope.clone();
            let name = service.name().to_string();
            let handle = tasks.spawn(async move { service.start(cancel).await });
            names.insert(handle.id(), name);
        }

        let mut first_failure = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.unwrap_or_else(|join_err| {
                Err(StartError::Panicked {
                    service: names.remove(&join_err.id()).unwrap_or_default(),
                })
            });

            match outcome {
                Ok(()) => {}
                Err(err) if err.is_benign() => {
                    tracing::debug!(service = err.service(), "{}", err);
                }
                Err(err) => {
                    tracing::error!(
                        service = err.service(),
                        error = %err,
                        "Service went down, stopping the others"
                    );
                    scope.cancel();
                    if first_failure.is_none() {
                        first_failure = Some(err);
                    }
                }
            }
        }

        match first_failure {
            Some(err) => Err(StartAggregateError::ServiceFailed(err)),
            None => {
                tracing::info!("All services stopped");
                Ok(())
            }
        }
    }

    /// Gracefully stop every registered service under one shared deadline
    ///
    /// Only the first call does anything; later or concurrent calls return
    /// [`ShutdownOutcome::AlreadyShuttingDown`]. Services that already
    /// ended on their own are skipped. Every genuine failure is collected in
    /// the returned error.
    pub async fn gracefully_shutdown(&self) -> Result<ShutdownOutcome, ShutdownAggregateError> {
        self.shared.gracefully_shutdown().await
    }

    /// Whether a shutdown has been initiated
    pub fn is_shutdown_initiated(&self) -> bool {
        self.shared.shutdown.is_initiated()
    }

    /// Shut down when the process receives SIGINT or SIGTERM
    ///
    /// The handlers are installed before this returns, so a signal that
    /// arrives before the listener task first runs still triggers the
    /// shutdown. Must be called inside a Tokio runtime.
    pub fn enable_shutdown_on_termination_signal(self) -> Self {
        let signal = TerminationSignal::install();
        self.shutdown_on(signal.recv())
    }

    /// Shut down once `trigger` completes
    ///
    /// The listener belongs to this coordinator and is aborted when the
    /// coordinator is dropped. Calling this again replaces the previous
    /// listener. Must be called inside a Tokio runtime.
    pub fn shutdown_on<F>(mut self, trigger: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        self.signal_bridge = Some(SignalBridge::spawn(trigger, async move {
            match shared.gracefully_shutdown().await {
                Ok(ShutdownOutcome::Completed) => {}
                Ok(ShutdownOutcome::AlreadyShuttingDown) => {
                    tracing::info!("Shutdown was already in progress");
                }
                Err(e) => tracing::error!("Error during graceful shutdown: {}", e),
            }
        }));
        self
    }

    /// Wait until a signal-triggered shutdown has finished
    ///
    /// Returns immediately when no shutdown trigger was enabled.
    pub async fn wait_for_shutdown_completion(&self) {
        if let Some(bridge) = &self.signal_bridge {
            bridge.wait().await;
        }
    }
}
