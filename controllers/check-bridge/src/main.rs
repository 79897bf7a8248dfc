//! Check Bridge
//!
//! Runs the health checks declared in the `hootsuite.com/sensu-checks`
//! annotation of Kubernetes resources and reports their results to Sensu.
//!
//! One controller watches each configured kind (deployments, pods,
//! daemonsets, services). Every declared check runs on its own task, on its
//! own interval, against the latest snapshot of its resource.

mod adapter;
mod config;
mod controller;
mod error;
mod metrics;
mod probe;
mod registry;
mod watcher;
#[cfg(test)]
mod test_utils;

use crate::config::Cli;
use crate::controller::{spawn_controller, ControllerContext, Controllers};
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::probe::Readiness;
use crate::registry::CheckRegistry;
use checks::{CheckParser, CheckPluginRegistry};
use clap::Parser;
use kube::Client;
use sensu_client::{HttpTransport, MonitoringClient, SensuClient, SensuConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// How long startup waits for the first Sensu connection
const SENSU_CONNECT_WAIT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,kube=warn")),
        )
        .init();

    let cli = Cli::parse();

    let plugins = Arc::new(CheckPluginRegistry::with_builtin_checks());
    if cli.check_docs {
        print!("{}", checks::docs::render_text(&plugins));
        return Ok(());
    }
    if cli.check_docs_md {
        print!("{}", checks::docs::render_markdown(&plugins));
        return Ok(());
    }

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("rustls crypto provider already installed");
    }

    info!("Starting Check Bridge");
    info!("Configuration:");
    info!("  Sensu config: {}", cli.config_file);
    info!("  Namespace: {}", cli.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Probe address: {}", cli.probe_addr);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Sensu
    let sensu_config = SensuConfig::load(&cli.config_file)?;
    let transport = Arc::new(HttpTransport::new(&sensu_config.api)?);
    info!("  Sensu API: {}", transport.base_url());
    let defaults = sensu_config.defaults.clone();
    let sensu = SensuClient::new(sensu_config, transport);

    let sensu_task = tokio::spawn({
        let sensu = sensu.clone();
        let shutdown = shutdown_tx.subscribe();
        async move { sensu.start(shutdown).await }
    });
    if !sensu.wait_connected(SENSU_CONNECT_WAIT).await {
        warn!("Sensu not reachable after {:?}, continuing", SENSU_CONNECT_WAIT);
    }
    let keepalive_task = tokio::spawn({
        let sensu = sensu.clone();
        let shutdown = shutdown_tx.subscribe();
        async move { sensu.start_keepalive(shutdown).await }
    });

    // Check runtime
    let metrics = Arc::new(Metrics::new()?);
    let client: Arc<dyn MonitoringClient> = Arc::new(sensu);
    let parser = Arc::new(CheckParser::new(plugins).with_defaults(defaults));
    let registry = Arc::new(CheckRegistry::new(
        Arc::clone(&client),
        shutdown_tx.clone(),
        Arc::clone(&metrics),
        cli.execute_timeout(),
    ));
    let ctx = ControllerContext {
        parser,
        registry: Arc::clone(&registry),
        client,
        metrics: Arc::clone(&metrics),
    };

    // Kubernetes
    let kube_client = Client::try_default().await?;
    let readiness = Readiness::new();
    let mut controllers = Controllers::new();
    for kind in cli.resource_kinds() {
        // register up front so /readyz waits for every kind
        readiness.register(kind);
        let handle = spawn_controller(
            kind,
            kube_client.clone(),
            cli.namespace.clone(),
            ctx.clone(),
            readiness.clone(),
            shutdown_tx.clone(),
        );
        controllers.push(kind, handle);
    }

    let probe_task = tokio::spawn({
        let readiness = readiness.clone();
        let metrics = Arc::clone(&metrics);
        let shutdown = shutdown_tx.subscribe();
        let addr = cli.probe_addr;
        async move {
            if let Err(e) = probe::serve(addr, readiness, metrics, shutdown).await {
                error!("Probe server failed: {}", e);
            }
        }
    });

    info!("Check Bridge running");

    let outcome = tokio::select! {
        _ = shutdown_signal() => Ok(()),
        result = controllers.wait_any() => {
            error!("Controller exited unexpectedly");
            result
        }
    };

    // receivers may all be gone already
    let _ = shutdown_tx.send(());

    let grace = cli.shutdown_grace();
    registry.stop_all(grace).await;
    let background = async {
        controllers.join().await;
        let _ = tokio::join!(sensu_task, keepalive_task, probe_task);
    };
    if tokio::time::timeout(grace, background).await.is_err() {
        warn!("Background tasks did not stop within {:?}", grace);
    }

    info!("Check Bridge stopped");
    outcome
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
