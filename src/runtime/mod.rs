//! # Runtime
//!
//! The event-driven sync loop around the reconciler.
//!
//! - `informers`: watches feeding change notifications
//! - `coalescer`: collapses notifications into the single work-queue key
//! - `queue`: deduplicating work queue with per-key backoff
//! - `rate_limiter`: global token bucket gating sync passes
//! - `worker`: the single queue consumer
//! - `error_policy`: sync and watch error handling
//! - `initialization`: startup wiring

pub mod coalescer;
pub mod error_policy;
pub mod informers;
pub mod initialization;
pub mod queue;
pub mod rate_limiter;
pub mod worker;

use crate::config::ControllerConfig;
use crate::controller::reconciler::render;
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use tracing::{info, warn};

/// Run the operator until SIGINT or SIGTERM
pub async fn run(config: ControllerConfig) -> Result<()> {
    initialization::init_tracing(&config, false);
    let init = initialization::initialize(&config).await?;

    let worker = tokio::spawn(worker::run_worker(
        init.queue.clone(),
        Arc::clone(&init.limiter),
        Arc::clone(&init.reconciler),
    ));

    shutdown_signal().await;
    info!("Shutdown signal received, draining worker");
    init.server_state.mark_draining();
    init.queue.shut_down();
    init.informers.shut_down();

    if let Err(e) = worker.await {
        warn!(error = %e, "Worker task ended abnormally");
    }
    info!("Operator stopped");
    Ok(())
}

/// Print the configuration document a sync pass would write, without writing anything
pub async fn render_config(config: ControllerConfig) -> Result<()> {
    initialization::init_tracing(&config, true);
    initialization::install_crypto_provider();

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    // Notifications are not consumed here
    let queue = queue::WorkQueue::new(config.retry_base_delay(), config.retry_max_delay());
    let coalescer = coalescer::EventCoalescer::with_default_triggers(queue.clone());
    let informers = informers::Informers::start(&client, &coalescer);
    initialization::wait_for_caches(&informers, config.cache_sync_timeout()).await?;

    let reconciler = initialization::build_reconciler(&client, &informers);
    let document = reconciler.render().await?;
    informers.shut_down();
    queue.shut_down();

    print!("{}", render(&document)?);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
