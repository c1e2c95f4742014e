//! In-memory ReplicaStore for reconciler tests

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, Time};
use kube::core::ErrorResponse;
use kube::ResourceExt;
use tokio_util::sync::CancellationToken;

use replica_pool_operator::crd::{ReplicaPool, ReplicaPoolSpec};
use replica_pool_operator::reconcilers::{NameGenerator, Reconciler, ScaleDownPolicy};
use replica_pool_operator::selector::UnitSelector;
use replica_pool_operator::store::{PoolKey, ReplicaStore};
use replica_pool_operator::{Error, Result};

pub const NAMESPACE: &str = "team-a";
pub const POOL_NAME: &str = "web";
pub const POOL_UID: &str = "5f1c9a8e-pool-uid";

/// Store calls, in the order they were made
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    GetPool,
    ReplaceStatus,
    List,
    GetUnit(String),
    Create(String),
    Delete(String),
}

#[derive(Default)]
struct State {
    pools: BTreeMap<PoolKey, ReplicaPool>,
    pods: Vec<Pod>,
    calls: Vec<Call>,
    resource_version: u64,
    pod_clock: i64,
    create_attempts: usize,
    fail_create_on: Option<usize>,
    cancel_on_create: Option<(usize, CancellationToken)>,
    fail_list: bool,
    fail_delete: bool,
    conflict_next_status: bool,
    hidden: HashSet<String>,
}

/// Thread-safe in-memory object store
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

pub fn pool_key() -> PoolKey {
    PoolKey::new(NAMESPACE, POOL_NAME)
}

pub fn app_labels() -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), POOL_NAME.to_string())])
}

/// A valid pool named `web` selecting `app=web`
pub fn pool(size: i32) -> ReplicaPool {
    let mut pool = ReplicaPool::new(
        POOL_NAME,
        ReplicaPoolSpec {
            size,
            selector: Some(LabelSelector {
                match_labels: Some(app_labels()),
                match_expressions: None,
            }),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(app_labels()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: "worker".to_string(),
                        image: Some("busybox:1.36".to_string()),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
        },
    );
    pool.metadata.namespace = Some(NAMESPACE.to_string());
    pool.metadata.uid = Some(POOL_UID.to_string());
    pool
}

fn api_error(code: u16, reason: &str, message: &str) -> Error {
    Error::Kube(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: message.to_string(),
        reason: reason.to_string(),
        code,
    }))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Store a pool, assigning it a resource version
    pub fn with_pool(self, mut pool: ReplicaPool) -> Self {
        {
            let mut state = self.lock();
            state.resource_version += 1;
            pool.metadata.resource_version = Some(state.resource_version.to_string());
            state.pools.insert(PoolKey::from_pool(&pool), pool);
        }
        self
    }

    /// Add `count` Pods labelled for the `web` pool, named `web-seedN`
    pub fn with_pods(self, count: usize) -> Self {
        for i in 0..count {
            self.add_pod(&format!("{}-seed{}", POOL_NAME, i), NAMESPACE, app_labels());
        }
        self
    }

    /// Add a Pod; creation timestamps increase with every Pod added
    pub fn add_pod(&self, name: &str, namespace: &str, labels: BTreeMap<String, String>) {
        let mut state = self.lock();
        let created = Self::tick(&mut state);
        state.pods.push(Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                labels: Some(labels),
                creation_timestamp: Some(created),
                ..Default::default()
            },
            ..Default::default()
        });
    }

    /// Add a Pod with an explicit creation minute
    pub fn add_pod_created_at(&self, name: &str, minute: i64) {
        let mut state = self.lock();
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        state.pods.push(Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(NAMESPACE.to_string()),
                labels: Some(app_labels()),
                creation_timestamp: Some(Time(base + Duration::minutes(minute))),
                ..Default::default()
            },
            ..Default::default()
        });
    }

    fn tick(state: &mut State) -> Time {
        state.pod_clock += 1;
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Time(base + Duration::seconds(state.pod_clock))
    }

    /// Fail the `n`th create call (1-based)
    pub fn fail_create_on(&self, n: usize) {
        self.lock().fail_create_on = Some(n);
    }

    /// Cancel `token` while the `n`th create call (1-based) is in flight
    pub fn cancel_on_create(&self, n: usize, token: CancellationToken) {
        self.lock().cancel_on_create = Some((n, token));
    }

    /// Delete a pool as if a user removed it
    pub fn remove_pool(&self, key: &PoolKey) {
        self.lock().pools.remove(key);
    }

    pub fn fail_list(&self) {
        self.lock().fail_list = true;
    }

    pub fn fail_delete(&self) {
        self.lock().fail_delete = true;
    }

    /// Reject the next status write as stale
    pub fn conflict_next_status(&self) {
        self.lock().conflict_next_status = true;
    }

    /// Make `get_unit` report this Pod as gone while it still shows in lists
    pub fn hide_unit(&self, name: &str) {
        self.lock().hidden.insert(name.to_string());
    }

    pub fn pool(&self) -> ReplicaPool {
        self.lock().pools.get(&pool_key()).cloned().unwrap()
    }

    pub fn pods(&self) -> Vec<Pod> {
        self.lock().pods.clone()
    }

    pub fn pod_names(&self) -> Vec<String> {
        self.lock().pods.iter().map(|p| p.name_any()).collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn creates(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete(name) => Some(name),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ReplicaStore for MemoryStore {
    async fn get_pool(&self, key: &PoolKey) -> Result<Option<ReplicaPool>> {
        let mut state = self.lock();
        state.calls.push(Call::GetPool);
        Ok(state.pools.get(key).cloned())
    }

    async fn replace_pool_status(&self, pool: &ReplicaPool) -> Result<ReplicaPool> {
        let mut state = self.lock();
        state.calls.push(Call::ReplaceStatus);

        if state.conflict_next_status {
            state.conflict_next_status = false;
            return Err(api_error(409, "Conflict", "the object has been modified"));
        }

        let key = PoolKey::from_pool(pool);
        let next_version = state.resource_version + 1;
        let stored = state
            .pools
            .get_mut(&key)
            .ok_or_else(|| api_error(404, "NotFound", "replicapool not found"))?;

        if stored.metadata.resource_version != pool.metadata.resource_version {
            return Err(api_error(409, "Conflict", "the object has been modified"));
        }

        stored.status = pool.status.clone();
        stored.metadata.resource_version = Some(next_version.to_string());
        let updated = stored.clone();
        state.resource_version = next_version;
        Ok(updated)
    }

    async fn list_units(&self, namespace: &str, selector: &UnitSelector) -> Result<Vec<Pod>> {
        let mut state = self.lock();
        state.calls.push(Call::List);
        if state.fail_list {
            return Err(api_error(500, "InternalError", "list failed"));
        }
        Ok(state
            .pods
            .iter()
            .filter(|p| p.namespace().as_deref() == Some(namespace))
            .filter(|p| selector.matches(p.labels()))
            .cloned()
            .collect())
    }

    async fn get_unit(&self, namespace: &str, name: &str) -> Result<Pod> {
        let mut state = self.lock();
        state.calls.push(Call::GetUnit(name.to_string()));
        if state.hidden.contains(name) {
            return Err(Error::UnitNotFound(format!("{}/{}", namespace, name)));
        }
        state
            .pods
            .iter()
            .find(|p| p.name_any() == name && p.namespace().as_deref() == Some(namespace))
            .cloned()
            .ok_or_else(|| Error::UnitNotFound(format!("{}/{}", namespace, name)))
    }

    async fn create_unit(&self, unit: &Pod) -> Result<Pod> {
        let mut state = self.lock();
        state.calls.push(Call::Create(unit.name_any()));
        state.create_attempts += 1;
        if let Some((n, token)) = &state.cancel_on_create {
            if *n == state.create_attempts {
                token.cancel();
            }
        }
        if state.fail_create_on == Some(state.create_attempts) {
            return Err(api_error(500, "InternalError", "injected create failure"));
        }
        let mut created = unit.clone();
        created.metadata.creation_timestamp = Some(Self::tick(&mut state));
        state.pods.push(created.clone());
        Ok(created)
    }

    async fn delete_unit(&self, namespace: &str, name: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::Delete(name.to_string()));
        if state.fail_delete {
            return Err(api_error(500, "InternalError", "injected delete failure"));
        }
        state
            .pods
            .retain(|p| !(p.name_any() == name && p.namespace().as_deref() == Some(namespace)));
        Ok(())
    }
}

/// Reconciler over `store` with a fixed name seed
pub fn reconciler(store: &MemoryStore, policy: ScaleDownPolicy) -> Reconciler {
    Reconciler::new(Arc::new(store.clone()), NameGenerator::seeded(2024), policy)
}

/// `<pool>-` followed by five characters from `[0-9a-z]`
pub fn is_generated_name(name: &str) -> bool {
    let Some(suffix) = name.strip_prefix(&format!("{}-", POOL_NAME)) else {
        return false;
    };
    suffix.len() == 5
        && suffix
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
}
