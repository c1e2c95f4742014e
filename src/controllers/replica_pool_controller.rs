//! ReplicaPool controller
//!
//! Watches ReplicaPool resources and the Pods they own, and triggers
//! reconciliation.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    api::ListParams,
    runtime::{
        controller::{Action, Controller},
        watcher::Config as WatcherConfig,
    },
    Api, Client, Resource, ResourceExt,
};
use tracing::{error, info, instrument};

use crate::controllers::Context;
use crate::crd::ReplicaPool;
use crate::error::{Error, Result};
use crate::metrics;
use crate::store::PoolKey;

const KIND: &str = "ReplicaPool";

fn scoped<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Run the ReplicaPool controller
pub async fn run(client: Client, context: Arc<Context>) {
    let namespace = context.config.watch_namespace.as_deref();
    let pools: Api<ReplicaPool> = scoped(&client, namespace);
    let pods: Api<Pod> = scoped(&client, namespace);

    // Verify CRD is installed
    if let Err(e) = pools.list(&ListParams::default().limit(1)).await {
        error!("ReplicaPool CRD not installed: {}", e);
        return;
    }

    info!(
        namespace = namespace.unwrap_or("*"),
        scale_down_policy = %context.config.scale_down_policy,
        "Starting ReplicaPool controller"
    );

    Controller::new(pools, WatcherConfig::default())
        .owns(pods, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    info!(
                        name = %obj.name,
                        namespace = obj.namespace.as_deref().unwrap_or("default"),
                        "Reconciled ReplicaPool"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Reconciliation error");
                    metrics::RECONCILIATION_ERRORS.with_label_values(&[KIND]).inc();
                }
            }
        })
        .await;
}

/// Main reconciliation function
#[instrument(skip(obj, ctx), fields(name = %obj.name_any(), namespace = obj.namespace()))]
async fn reconcile(obj: Arc<ReplicaPool>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = metrics::RECONCILE_DURATION
        .with_label_values(&[KIND])
        .start_timer();
    metrics::RECONCILIATIONS.with_label_values(&[KIND]).inc();

    let key = PoolKey::from_pool(&obj);
    let outcome = ctx.reconciler.reconcile(&key, &ctx.shutdown).await?;

    info!(
        pool = %key,
        requeue_now = outcome.requeue_now,
        phase = ?outcome.phase,
        "Reconcile pass finished"
    );

    Ok(outcome.into_action(ctx.config.requeue_delay))
}

/// Error policy for the controller
fn error_policy(obj: Arc<ReplicaPool>, error: &Error, _ctx: Arc<Context>) -> Action {
    let name = obj.name_any();
    error!(
        name = %name,
        error = %error,
        "Reconciliation failed, scheduling retry"
    );

    Action::requeue(retry_delay(error))
}

/// Fixed retry delay per error kind
fn retry_delay(error: &Error) -> Duration {
    match error {
        Error::Kube(kube::Error::Api(resp)) if resp.code == 409 => Duration::from_secs(1),
        Error::UnitNotFound(_) => Duration::from_secs(5),
        Error::Kube(_) => Duration::from_secs(30),
        Error::Config(_) | Error::Validation(_) => Duration::from_secs(300),
        _ => Duration::from_secs(30),
    }
}
