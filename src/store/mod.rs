//! Object store access for the reconciler
//!
//! The reconciler never talks to the API server directly. It goes through
//! [`ReplicaStore`], which `KubeStore` implements on top of a kube `Client`
//! and which tests replace with an in-memory store.

mod kube_store;

pub use kube_store::KubeStore;

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use tokio_util::sync::CancellationToken;

use crate::crd::ReplicaPool;
use crate::error::{Error, Result};
use crate::selector::UnitSelector;

/// Namespace and name of a ReplicaPool
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PoolKey {
    pub namespace: String,
    pub name: String,
}

impl PoolKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of an existing pool object
    pub fn from_pool(pool: &ReplicaPool) -> Self {
        Self::new(
            pool.namespace().unwrap_or_else(|| "default".to_string()),
            pool.name_any(),
        )
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Operations the reconciler needs from the object store
#[async_trait]
pub trait ReplicaStore: Send + Sync {
    /// Fetch a pool; `Ok(None)` when it does not exist
    async fn get_pool(&self, key: &PoolKey) -> Result<Option<ReplicaPool>>;

    /// Write the pool's status subresource.
    ///
    /// The write carries the pool's `resourceVersion` and is rejected when
    /// the stored object has moved on.
    async fn replace_pool_status(&self, pool: &ReplicaPool) -> Result<ReplicaPool>;

    /// List Pods in `namespace` matching `selector`
    async fn list_units(&self, namespace: &str, selector: &UnitSelector) -> Result<Vec<Pod>>;

    /// Fetch a Pod by name; `Error::UnitNotFound` when it is gone
    async fn get_unit(&self, namespace: &str, name: &str) -> Result<Pod>;

    /// Create a Pod
    async fn create_unit(&self, unit: &Pod) -> Result<Pod>;

    /// Delete a Pod immediately (zero grace period)
    async fn delete_unit(&self, namespace: &str, name: &str) -> Result<()>;
}

/// Run a store call unless `cancel` fires first.
///
/// Nothing is started once the token is cancelled, and a call in flight is
/// dropped when cancellation arrives.
pub async fn guarded<T, F>(cancel: &CancellationToken, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = call => result,
    }
}
