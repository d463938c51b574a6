//! # Initialization
//!
//! Operator startup: rustls setup, tracing, metrics, the probe server, the
//! Kubernetes client, informers and the reconciler.

use super::coalescer::EventCoalescer;
use super::informers::Informers;
use super::queue::WorkQueue;
use super::rate_limiter::TokenBucket;
use crate::config::ControllerConfig;
use crate::constants::WORK_QUEUE_KEY;
use crate::controller::reconciler::{
    KubeNamespaceClient, KubeOperatorConfigClient, KubeWorkloadApplier, Reconciler,
};
use crate::observability;
use crate::server::{start_server, ServerState};
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::fmt::writer::BoxMakeWriter;

const SERVER_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
const SERVER_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Everything the run loop needs
pub struct InitializationResult {
    pub client: Client,
    pub reconciler: Arc<Reconciler>,
    pub queue: WorkQueue<String>,
    pub limiter: Arc<TokenBucket>,
    pub informers: Informers,
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("readiness", &self.server_state.readiness())
            .field("queue_depth", &self.queue.len())
            .finish_non_exhaustive()
    }
}

/// Install ring as the rustls crypto provider
///
/// Must run before the first TLS connection. A second install is harmless.
pub fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }
}

/// Set up the tracing subscriber
///
/// `RUST_LOG` wins over the configured level. Logs go to stderr when
/// `to_stderr` is set so stdout stays clean for command output.
pub fn init_tracing(config: &ControllerConfig, to_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "controller_manager_operator={}",
            config.log_level.to_lowercase()
        )
        .into()
    });
    let writer = if to_stderr {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };

    let result = if config.json_logs() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(writer)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("Tracing subscriber already initialized: {e}");
    }
}

/// Build a reconciler talking to the cluster through `client`
pub fn build_reconciler(client: &Client, informers: &Informers) -> Reconciler {
    Reconciler::new(
        Arc::new(informers.listers.clone()),
        Arc::new(KubeOperatorConfigClient::new(client.clone())),
        Arc::new(KubeNamespaceClient::new(client.clone())),
        Arc::new(KubeWorkloadApplier::new(client.clone())),
    )
}

/// Wait for every informer cache to finish its initial list
pub async fn wait_for_caches(informers: &Informers, timeout: Duration) -> Result<()> {
    info!(timeout_secs = timeout.as_secs(), "Waiting for informer caches to sync");
    tokio::time::timeout(timeout, informers.listers.wait_until_ready())
        .await
        .with_context(|| {
            format!(
                "Informer caches did not sync within {} seconds",
                timeout.as_secs()
            )
        })?
        .context("Informer stopped before its cache synced")?;
    info!(listers = ?informers.listers, "Informer caches synced");
    Ok(())
}

/// Initialize the operator runtime
///
/// Tracing must already be set up with [`init_tracing`].
pub async fn initialize(config: &ControllerConfig) -> Result<InitializationResult> {
    install_crypto_provider();

    info!("Starting controller-manager operator");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    debug!(config = ?config, "Operator configuration");

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_handle = {
        let state = Arc::clone(&server_state);
        let port = config.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = start_server(port, state).await {
                error!("HTTP server error: {}", e);
            }
        })
    };
    wait_for_server_ready(&server_state, &server_handle).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let queue = WorkQueue::new(config.retry_base_delay(), config.retry_max_delay());
    let limiter = Arc::new(TokenBucket::new(config.sync_rate_qps, config.sync_burst));
    let coalescer = EventCoalescer::with_default_triggers(queue.clone());
    let informers = Informers::start(&client, &coalescer);

    wait_for_caches(&informers, config.cache_sync_timeout()).await?;

    let reconciler = Arc::new(build_reconciler(&client, &informers));

    // Initial pass even if nothing changes after startup
    queue.add(WORK_QUEUE_KEY.to_string());

    server_state.mark_ready();
    info!("Operator initialized, starting worker");

    Ok(InitializationResult {
        client,
        reconciler,
        queue,
        limiter,
        informers,
        server_state,
    })
}

/// Wait for the HTTP server to bind
async fn wait_for_server_ready(
    server_state: &ServerState,
    server_handle: &tokio::task::JoinHandle<()>,
) -> Result<()> {
    let start = tokio::time::Instant::now();
    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }
        if server_state.is_listening() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }
        if start.elapsed() > SERVER_STARTUP_TIMEOUT {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                SERVER_STARTUP_TIMEOUT.as_secs()
            ));
        }
        tokio::time::sleep(SERVER_POLL_INTERVAL).await;
    }
}
