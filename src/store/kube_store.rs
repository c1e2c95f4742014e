//! [`ReplicaStore`] backed by the Kubernetes API server

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    api::{DeleteParams, ListParams, PostParams},
    Api, Client, ResourceExt,
};
use tracing::debug;

use super::{PoolKey, ReplicaStore};
use crate::crd::ReplicaPool;
use crate::error::{Error, Result};
use crate::selector::UnitSelector;

/// Store that reads and writes through a kube `Client`
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn pools(&self, namespace: &str) -> Api<ReplicaPool> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ReplicaStore for KubeStore {
    async fn get_pool(&self, key: &PoolKey) -> Result<Option<ReplicaPool>> {
        Ok(self.pools(&key.namespace).get_opt(&key.name).await?)
    }

    async fn replace_pool_status(&self, pool: &ReplicaPool) -> Result<ReplicaPool> {
        let key = PoolKey::from_pool(pool);
        let data = serde_json::to_vec(pool)?;
        let updated = self
            .pools(&key.namespace)
            .replace_status(&key.name, &PostParams::default(), data)
            .await?;
        debug!(
            pool = %key,
            resource_version = updated.resource_version().as_deref().unwrap_or(""),
            "Replaced ReplicaPool status"
        );
        Ok(updated)
    }

    async fn list_units(&self, namespace: &str, selector: &UnitSelector) -> Result<Vec<Pod>> {
        let params = ListParams::default().labels(&selector.to_query());
        let list = self.pods(namespace).list(&params).await?;
        Ok(list.items)
    }

    async fn get_unit(&self, namespace: &str, name: &str) -> Result<Pod> {
        self.pods(namespace).get(name).await.map_err(|e| match e {
            kube::Error::Api(api_err) if api_err.code == 404 => {
                Error::UnitNotFound(format!("{}/{}", namespace, name))
            }
            other => Error::Kube(other),
        })
    }

    async fn create_unit(&self, unit: &Pod) -> Result<Pod> {
        let namespace = unit
            .namespace()
            .ok_or_else(|| Error::validation("Pod has no namespace"))?;
        Ok(self
            .pods(&namespace)
            .create(&PostParams::default(), unit)
            .await?)
    }

    async fn delete_unit(&self, namespace: &str, name: &str) -> Result<()> {
        let params = DeleteParams {
            grace_period_seconds: Some(0),
            ..DeleteParams::default()
        };
        self.pods(namespace).delete(name, &params).await?;
        Ok(())
    }
}
