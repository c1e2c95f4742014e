//! Custom Resource Definitions for the ReplicaPool Operator

mod replica_pool;

pub use replica_pool::*;

use kube::CustomResourceExt;

/// Generate all CRD YAML manifests
pub fn generate_crds() -> Result<Vec<String>, serde_yaml::Error> {
    Ok(vec![serde_yaml::to_string(&ReplicaPool::crd())?])
}
