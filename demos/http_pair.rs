//! Two HTTP listeners under one coordinator.
//!
//! `:8000` answers immediately, `:8001` takes three seconds per request so a
//! Ctrl+C while it is busy shows the graceful drain.
//!
//! ```text
//! cargo run --example http_pair
//! MULTISERVE_SHUTDOWN_TIMEOUT_MS=1000 cargo run --example http_pair
//! ```

use axum::{Router, http::header, response::IntoResponse, routing::get};
use multiserve::prelude::*;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(6);

async fn handler() -> &'static str {
    "Hello, World"
}

async fn long_lived_handler() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(3)).await;
    (
        [(header::CONTENT_TYPE, "text/plain")],
        "Hello, World\nHello, World2\n",
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "multiserve=debug,http_pair=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = ConfigService::from_env();
    let mut config = CoordinatorConfig::load(&settings)?;
    config.shutdown_timeout = config.shutdown_timeout.or(Some(DEFAULT_SHUTDOWN_TIMEOUT));
    config.shutdown_on_signal = true;

    let fast_port = u16::try_from(settings.get_u64("FAST_PORT")?.unwrap_or(8000))?;
    let slow_port = u16::try_from(settings.get_u64("SLOW_PORT")?.unwrap_or(8001))?;

    let fast = TcpListener::bind(("0.0.0.0", fast_port)).await?;
    let slow = TcpListener::bind(("0.0.0.0", slow_port)).await?;

    let coordinator = Coordinator::from_config(&config)
        .register(HttpServer::new(Router::new().route("/", get(handler)), fast).with_name("fast"))
        .register(
            HttpServer::new(Router::new().route("/", get(long_lived_handler)), slow)
                .with_name("slow"),
        );

    tracing::info!(
        fast_port,
        slow_port,
        timeout = ?config.shutdown_timeout,
        "Serving, press Ctrl+C to stop"
    );

    if let Err(e) = coordinator.start(&CancellationToken::new()).await {
        tracing::error!("A server went down: {}", e);
    }
    coordinator.wait_for_shutdown_completion().await;

    tracing::info!("Shutdown");
    Ok(())
}
