// src/main.rs
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

mod check;
mod config;
mod registry;
mod scheduler;

use crate::{
    check::{Check, DescBuilder, Failure, Status},
    config::HealthConfig,
    registry::Registry,
    scheduler::Scheduler,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("health_scheduler=debug".parse()?),
        )
        .init();

    // Load configuration if a path was given, otherwise use the defaults
    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            config::load_config(&path).await?
        }
        None => HealthConfig::default(),
    };

    let registry = Arc::new(Registry::with_config(&config));

    // An HTTP ping against a public endpoint
    let ping_url = std::env::args()
        .nth(2)
        .unwrap_or_else(|| "https://example.com".to_string());
    let http_desc = Arc::new(
        DescBuilder::new()
            .description("http endpoint")
            .yellow_impact("responses degraded")
            .red_impact("endpoint unreachable")
            .build()?,
    );
    let client = reqwest::Client::new();
    registry.register(
        Check::builder()
            .desc(http_desc)
            .description(format!("GET {ping_url}"))
            .red_impact("endpoint unreachable")
            .limits(config.limits.clone())
            .timeout(Duration::from_secs(3))
            .run_interval(Duration::from_secs(5))
            .checker_fn(move || {
                let client = client.clone();
                let url = ping_url.clone();
                async move {
                    match client.get(&url).send().await {
                        Ok(response) if response.status().is_success() => None,
                        Ok(response) => Some(Failure::red(format!("HTTP {}", response.status()))),
                        Err(e) => Some(Failure::red(e.to_string())),
                    }
                }
            })
            .build()?,
    )?;

    // A trivial in-process liveness check
    let process_desc = Arc::new(
        DescBuilder::new()
            .description("process")
            .red_impact("event loop stalled")
            .build()?,
    );
    registry.register(
        Check::builder()
            .desc(process_desc)
            .description("event loop responsive")
            .red_impact("event loop stalled")
            .limits(config.limits.clone())
            .run_interval(Duration::from_secs(5))
            .checker_fn(|| async { None })
            .build()?,
    )?;

    let scheduler = Scheduler::start_with_config(&registry, &config);
    info!(
        checks = registry.health_checks(None).len(),
        "health scheduler started"
    );

    // Report every result; this is the consumer's job, the scheduler itself
    // never logs outcomes.
    let mut results = scheduler.subscribe(None).await;
    let reporter = tokio::spawn(async move {
        while let Some(result) = results.recv().await {
            match result.status {
                Status::Green => info!(
                    check_id = %result.health_check_id,
                    duration = ?result.duration,
                    "health check green"
                ),
                Status::Yellow => warn!(
                    check_id = %result.health_check_id,
                    duration = ?result.duration,
                    error = ?result.error,
                    "health check yellow"
                ),
                Status::Red => warn!(
                    check_id = %result.health_check_id,
                    duration = ?result.duration,
                    error = ?result.error,
                    "health check red"
                ),
            }
        }
    });

    shutdown_signal().await;
    scheduler.stop_async();
    scheduler.done().await;
    reporter.await?;
    info!("health scheduler stopped");

    Ok(())
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
