//! Reconcilers for ReplicaPool CRDs
//!
//! This module contains the business logic for reconciling a ReplicaPool:
//! - Validating the ReplicaPool `spec` fields
//! - Building Pods from the template
//! - Choosing Pods to remove on scale-down
//! - Updating resource status

pub mod replica_pool;
pub mod scale_down;
pub mod status;
pub mod unit;

pub use replica_pool::{validate, PoolPhase, ReconcileOutcome, Reconciler};
pub use scale_down::ScaleDownPolicy;
pub use unit::NameGenerator;
