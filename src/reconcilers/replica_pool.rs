//! ReplicaPool reconciler
//!
//! One pass reads the pool fresh from the store, counts the Pods matching its
//! selector and then either creates the missing Pods, deletes the surplus, or
//! records that the pool has converged. Creations and deletions are issued
//! one at a time and the pass stops at the first failure.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::Pod;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::scale_down::{select_victims, ScaleDownPolicy};
use super::status::{persist_status, set_available};
use super::unit::{build_unit, NameGenerator};
use crate::crd::{ConditionStatus, ReplicaPool, MAX_POOL_SIZE, MIN_POOL_SIZE};
use crate::error::{Error, Result};
use crate::metrics;
use crate::selector::UnitSelector;
use crate::store::{guarded, PoolKey, ReplicaStore};

/// Message written to the `Available` condition once the pool has converged
pub const CONVERGED_MESSAGE: &str = "converged";

/// Where a pool stands after a pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolPhase {
    /// Pods were created or deleted; another pass will check the result
    Converging,
    /// Observed Pods match the desired size
    Available,
    /// Spec rejected or a create failed; waits for the next change
    Failed,
}

/// Result of a reconcile pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Run another pass for this pool right away
    pub requeue_now: bool,

    /// Phase reached; `None` when the pool no longer exists
    pub phase: Option<PoolPhase>,
}

impl ReconcileOutcome {
    fn gone() -> Self {
        Self {
            requeue_now: false,
            phase: None,
        }
    }

    fn converging() -> Self {
        Self {
            requeue_now: true,
            phase: Some(PoolPhase::Converging),
        }
    }

    fn settled(phase: PoolPhase) -> Self {
        Self {
            requeue_now: false,
            phase: Some(phase),
        }
    }

    /// Controller action for this outcome
    pub fn into_action(self, requeue_delay: Duration) -> Action {
        if self.requeue_now {
            Action::requeue(requeue_delay)
        } else {
            Action::await_change()
        }
    }
}

/// Validate the ReplicaPool spec
pub fn validate(pool: &ReplicaPool) -> Result<()> {
    let size = pool.spec.size;
    if !(MIN_POOL_SIZE..=MAX_POOL_SIZE).contains(&size) {
        return Err(Error::validation(format!(
            "Invalid size {}: must be between {} and {}",
            size, MIN_POOL_SIZE, MAX_POOL_SIZE
        )));
    }

    let selector = UnitSelector::for_pool(pool)?;
    if selector.is_empty() {
        return Err(Error::validation(
            "Empty selector: set spec.selector or labels on spec.template",
        ));
    }

    if !selector.matches(&pool.spec.template_labels()) {
        return Err(Error::validation(format!(
            "Template labels do not match selector '{}'",
            selector
        )));
    }

    Ok(())
}

/// Drives ReplicaPools toward their declared size
pub struct Reconciler {
    store: Arc<dyn ReplicaStore>,
    names: NameGenerator,
    scale_down_policy: ScaleDownPolicy,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ReplicaStore>,
        names: NameGenerator,
        scale_down_policy: ScaleDownPolicy,
    ) -> Self {
        Self {
            store,
            names,
            scale_down_policy,
        }
    }

    /// Run one reconcile pass for the pool at `key`
    pub async fn reconcile(
        &self,
        key: &PoolKey,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome> {
        let Some(mut pool) = guarded(cancel, self.store.get_pool(key)).await? else {
            info!(pool = %key, "ReplicaPool not found, assuming it was deleted");
            metrics::forget_pool(&key.namespace, &key.name);
            return Ok(ReconcileOutcome::gone());
        };

        if pool.status.as_ref().map_or(true, |s| s.conditions.is_empty()) {
            pool = self.initialise_status(key, pool, cancel).await?;
        }

        if let Err(e) = validate(&pool) {
            warn!(pool = %key, error = %e, "ReplicaPool spec is invalid");
            set_available(&mut pool, ConditionStatus::False, &e.to_string());
            persist_status(self.store.as_ref(), &pool, cancel).await?;
            return Ok(ReconcileOutcome::settled(PoolPhase::Failed));
        }

        let selector = UnitSelector::for_pool(&pool)?;
        let units = guarded(cancel, self.store.list_units(&key.namespace, &selector))
            .await
            .inspect_err(|e| warn!(pool = %key, error = %e, "Failed to list Pods"))?;

        let observed = units.len();
        let desired = pool.spec.size as usize;
        metrics::OBSERVED_UNITS
            .with_label_values(&[&key.namespace, &key.name])
            .set(observed as f64);
        metrics::DESIRED_UNITS
            .with_label_values(&[&key.namespace, &key.name])
            .set(desired as f64);

        debug!(
            pool = %key,
            observed,
            desired,
            selector = %selector,
            "Compared Pods to desired size"
        );

        match observed.cmp(&desired) {
            Ordering::Less => self.scale_up(key, pool, desired - observed, cancel).await,
            Ordering::Greater => {
                self.scale_down(key, pool, &units, observed - desired, cancel)
                    .await
            }
            Ordering::Equal => self.mark_converged(key, pool, &units, cancel).await,
        }
    }

    /// Record `Available=Unknown` on a pool seen for the first time
    async fn initialise_status(
        &self,
        key: &PoolKey,
        mut pool: ReplicaPool,
        cancel: &CancellationToken,
    ) -> Result<ReplicaPool> {
        info!(pool = %key, "Initialising ReplicaPool status");
        set_available(&mut pool, ConditionStatus::Unknown, "Starting reconciliation");
        let persisted = persist_status(self.store.as_ref(), &pool, cancel).await?;

        match guarded(cancel, self.store.get_pool(key)).await {
            Ok(Some(fresh)) => Ok(fresh),
            Ok(None) => {
                warn!(pool = %key, "ReplicaPool vanished after status initialisation");
                Ok(persisted)
            }
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) => {
                warn!(pool = %key, error = %e, "Failed to re-fetch ReplicaPool");
                Ok(persisted)
            }
        }
    }

    async fn scale_up(
        &self,
        key: &PoolKey,
        mut pool: ReplicaPool,
        missing: usize,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome> {
        info!(pool = %key, missing, "Creating Pods");

        for _ in 0..missing {
            let created = match build_unit(&pool, &self.names) {
                Ok(unit) => guarded(cancel, self.store.create_unit(&unit)).await,
                Err(e) => Err(e),
            };

            match created {
                Ok(unit) => {
                    info!(pool = %key, pod = %unit.name_any(), "Created Pod");
                    metrics::UNITS_CREATED
                        .with_label_values(&[&key.namespace, &key.name])
                        .inc();
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    // Recorded on the condition only: the pass returns Ok so
                    // no backoff retry is scheduled for creation failures.
                    warn!(pool = %key, error = %e, "Failed to create Pod");
                    metrics::UNIT_FAILURES
                        .with_label_values(&["create", &key.namespace, &key.name])
                        .inc();
                    let message = format!(
                        "Failed to create Pod for ReplicaPool {}: {}",
                        key.name, e
                    );
                    set_available(&mut pool, ConditionStatus::False, &message);
                    if let Err(Error::Cancelled) =
                        persist_status(self.store.as_ref(), &pool, cancel).await
                    {
                        return Err(Error::Cancelled);
                    }
                    return Ok(ReconcileOutcome::settled(PoolPhase::Failed));
                }
            }
        }

        Ok(ReconcileOutcome::converging())
    }

    async fn scale_down(
        &self,
        key: &PoolKey,
        mut pool: ReplicaPool,
        units: &[Pod],
        surplus: usize,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome> {
        let victims = select_victims(units, surplus, self.scale_down_policy);
        info!(
            pool = %key,
            surplus,
            policy = %self.scale_down_policy,
            victims = ?victims,
            "Deleting Pods"
        );

        for name in victims {
            if let Err(e) = guarded(cancel, self.store.get_unit(&key.namespace, &name)).await {
                if matches!(e, Error::Cancelled) {
                    return Err(e);
                }
                warn!(pool = %key, pod = %name, error = %e, "Pod selected for deletion is gone");
                metrics::UNIT_FAILURES
                    .with_label_values(&["delete", &key.namespace, &key.name])
                    .inc();
                let message = format!(
                    "Failed to fetch Pod {} for deletion from ReplicaPool {}: {}",
                    name, key.name, e
                );
                set_available(&mut pool, ConditionStatus::False, &message);
                persist_status(self.store.as_ref(), &pool, cancel).await?;
                return Err(e);
            }

            guarded(cancel, self.store.delete_unit(&key.namespace, &name))
                .await
                .inspect_err(|e| {
                    warn!(pool = %key, pod = %name, error = %e, "Failed to delete Pod");
                    metrics::UNIT_FAILURES
                        .with_label_values(&["delete", &key.namespace, &key.name])
                        .inc();
                })?;

            info!(pool = %key, pod = %name, "Deleted Pod");
            metrics::UNITS_DELETED
                .with_label_values(&[&key.namespace, &key.name])
                .inc();
        }

        Ok(ReconcileOutcome::converging())
    }

    async fn mark_converged(
        &self,
        key: &PoolKey,
        mut pool: ReplicaPool,
        units: &[Pod],
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome> {
        set_available(&mut pool, ConditionStatus::True, CONVERGED_MESSAGE);
        pool.status.get_or_insert_with(Default::default).unit_names =
            units.iter().map(|u| u.name_any()).collect();

        persist_status(self.store.as_ref(), &pool, cancel).await?;
        debug!(pool = %key, units = units.len(), "ReplicaPool converged");

        Ok(ReconcileOutcome::settled(PoolPhase::Available))
    }
}
