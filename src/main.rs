// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{anyhow, Result};
use axum::{http::StatusCode, routing::get, Router};
use azure_operator::{
    azure::ArmClient,
    config::Config,
    constants::{
        ERROR_REQUEUE_DURATION_SECS, KIND_AZURE_CONFIG, LEASE_DURATION_SECS, LEASE_GRACE_SECS,
        REQUEUE_IN_PROGRESS_SECS, REQUEUE_STEADY_SECS, TOKIO_WORKER_THREADS,
    },
    context::Context,
    crd::AzureConfig,
    deployment::DeploymentBuilder,
    errors::Error,
    metrics,
    reconcilers::{InstanceReconciler, ReconcileOutcome},
};
use clap::Parser;
use futures::StreamExt;
use kube::{
    runtime::{controller::Action, watcher, Controller},
    Api, Client, ResourceExt,
};
use kube_lease_manager::LeaseManagerBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] Error);

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("azure-operator")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    // Respects RUST_LOG environment variable if set, otherwise defaults to INFO level
    // Example: RUST_LOG=debug cargo run
    //
    // Respects RUST_LOG_FORMAT environment variable for output format
    // Example: RUST_LOG_FORMAT=json cargo run
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting Azure operator");

    let config = Config::parse();
    config.validate()?;
    debug!(
        management_endpoint = %config.management_endpoint,
        template_base_uri = %config.template_base_uri,
        operator_version = %config.operator_version,
        "Configuration loaded"
    );

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install the rustls crypto provider"))?;

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;

    let azure = Arc::new(ArmClient::new(
        config.credentials(),
        &config.management_endpoint,
        &config.login_endpoint,
    )?);
    let deployments = DeploymentBuilder::new(&config.template_base_uri, &config.operator_version);
    let ctx = Arc::new(Context::from_client(&client, azure, deployments));
    let reconciler = Arc::new(InstanceReconciler::new(ctx));

    let metrics_addr = config.metrics_socket_addr()?;

    tokio::select! {
        result = run_metrics_server(metrics_addr) => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("metrics server exited unexpectedly without error")
        }
        result = run_with_leader_election(client, &config, reconciler) => {
            error!("CRITICAL: AzureConfig controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("AzureConfig controller exited unexpectedly without error")
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, stopping");
            Ok(())
        }
    }
}

/// Serve `/metrics` and `/healthz`
async fn run_metrics_server(addr: SocketAddr) -> Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(|| async { "ok" }));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Serving metrics");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    metrics::gather_metrics().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// Run the controller while this replica holds the lease
///
/// Losing the lease stops the controller; it starts again once the lease is
/// reacquired.
async fn run_with_leader_election(
    client: Client,
    config: &Config,
    reconciler: Arc<InstanceReconciler>,
) -> Result<()> {
    let manager = LeaseManagerBuilder::new(client.clone(), config.lease_name.clone())
        .with_namespace(config.lease_namespace.clone())
        .with_identity(config.pod_name.clone())
        .with_duration(LEASE_DURATION_SECS)
        .with_grace(LEASE_GRACE_SECS)
        .build()
        .await?;
    let (mut is_leader, _lease_task) = manager.watch().await;

    loop {
        info!(lease = %config.lease_name, "Waiting for leadership");
        while !*is_leader.borrow_and_update() {
            is_leader.changed().await?;
        }

        metrics::record_leader_elected(&config.pod_name);
        info!(pod = %config.pod_name, "Acquired leadership, starting controller");

        tokio::select! {
            () = run_azureconfig_controller(client.clone(), reconciler.clone()) => {
                anyhow::bail!("AzureConfig controller stream ended")
            }
            result = wait_for_leadership_loss(&mut is_leader) => {
                result?;
                metrics::record_leader_lost(&config.pod_name);
                warn!(pod = %config.pod_name, "Lost leadership, stopping controller");
            }
        }
    }
}

async fn wait_for_leadership_loss(is_leader: &mut watch::Receiver<bool>) -> Result<()> {
    while *is_leader.borrow_and_update() {
        is_leader.changed().await?;
    }
    Ok(())
}

/// Run the `AzureConfig` controller
async fn run_azureconfig_controller(client: Client, reconciler: Arc<InstanceReconciler>) {
    info!("Starting AzureConfig controller");

    let api = Api::<AzureConfig>::all(client);

    Controller::new(api, watcher::Config::default())
        .run(reconcile_azureconfig_wrapper, error_policy, reconciler)
        .for_each(|_| futures::future::ready(()))
        .await;
}

/// Reconcile wrapper for `AzureConfig`
async fn reconcile_azureconfig_wrapper(
    cr: Arc<AzureConfig>,
    reconciler: Arc<InstanceReconciler>,
) -> Result<Action, ReconcileError> {
    debug!(
        name = %cr.name_any(),
        namespace = ?cr.namespace(),
        "Reconcile wrapper called for AzureConfig"
    );

    let start = Instant::now();
    match reconciler.ensure_created(&cr).await {
        Ok(ReconcileOutcome::Continue) => {
            metrics::record_reconciliation_success(KIND_AZURE_CONFIG, start.elapsed());
            // Steady state, check less frequently (5 minutes)
            Ok(Action::requeue(Duration::from_secs(REQUEUE_STEADY_SECS)))
        }
        Ok(ReconcileOutcome::Requeue) => {
            metrics::record_reconciliation_requeue(KIND_AZURE_CONFIG, start.elapsed());
            // Upgrade in progress, check again soon (30 seconds)
            Ok(Action::requeue(Duration::from_secs(REQUEUE_IN_PROGRESS_SECS)))
        }
        Err(e) => {
            error!("Failed to reconcile AzureConfig {}: {}", cr.key(), e);
            metrics::record_reconciliation_error(KIND_AZURE_CONFIG, start.elapsed());
            metrics::record_error(KIND_AZURE_CONFIG, e.metric_label());
            Err(e.into())
        }
    }
}

/// Error policy for the `AzureConfig` controller
fn error_policy(
    _resource: Arc<AzureConfig>,
    _err: &ReconcileError,
    _ctx: Arc<InstanceReconciler>,
) -> Action {
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}
