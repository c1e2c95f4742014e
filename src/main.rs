//! ReplicaPool Kubernetes Operator
//!
//! Main entry point for the operator. Sets up the Kubernetes client,
//! registers the ReplicaPool controller, and runs the reconciliation loop.

use std::sync::Arc;

use kube::Client;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use replica_pool_operator::{
    config::OperatorConfig,
    controllers::{self, Context},
    metrics,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    info!("Starting ReplicaPool Operator");

    let config = OperatorConfig::from_env()?;
    info!(?config, "Loaded operator configuration");

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    // Create shared context
    let shutdown = CancellationToken::new();
    let context = Arc::new(Context::new(client.clone(), config.clone(), shutdown.clone()));

    // Start metrics server
    let metrics_handle = tokio::spawn(metrics::serve(config.metrics_port));
    info!("Metrics server starting on port {}", config.metrics_port);

    let mut controller = tokio::spawn(controllers::run_replica_pool_controller(client, context));

    // Handle graceful shutdown
    let signalled = tokio::select! {
        _ = &mut controller => {
            error!("ReplicaPool controller exited unexpectedly");
            false
        }
        _ = metrics_handle => {
            error!("Metrics server exited unexpectedly");
            false
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, stopping operator");
            true
        }
    };

    if signalled {
        // Abort in-flight passes and let the controller drain
        shutdown.cancel();
        if let Err(e) = controller.await {
            error!("ReplicaPool controller task failed: {}", e);
        }
    }

    info!("ReplicaPool Operator stopped");
    Ok(())
}

/// Initialize tracing subscriber
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kube=warn,hyper=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install CTRL+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received CTRL+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
