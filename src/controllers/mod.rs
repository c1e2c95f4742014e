//! Kubernetes controller for ReplicaPool CRDs
//!
//! This module contains the controller that watches ReplicaPools and the Pods
//! they own, and triggers reconciliation.

mod replica_pool_controller;

pub use replica_pool_controller::run as run_replica_pool_controller;

use std::sync::Arc;

use kube::Client;
use tokio_util::sync::CancellationToken;

use crate::config::OperatorConfig;
use crate::reconcilers::{NameGenerator, Reconciler};
use crate::store::KubeStore;

/// Shared context for the controller
pub struct Context {
    /// Operator configuration
    pub config: OperatorConfig,

    /// ReplicaPool reconciler
    pub reconciler: Reconciler,

    /// Cancelled on shutdown; aborts in-flight passes
    pub shutdown: CancellationToken,
}

impl Context {
    /// Create a new context
    pub fn new(client: Client, config: OperatorConfig, shutdown: CancellationToken) -> Self {
        let store = Arc::new(KubeStore::new(client));
        let reconciler = Reconciler::new(
            store,
            NameGenerator::from_entropy(),
            config.scale_down_policy,
        );
        Self {
            config,
            reconciler,
            shutdown,
        }
    }
}
