//! Pod construction for ReplicaPools

use std::sync::Mutex;

use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::crd::ReplicaPool;
use crate::error::{Error, Result};

/// Length of the random suffix appended to Pod names
pub const NAME_SUFFIX_LEN: usize = 5;

const NAME_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Process-wide source of Pod name suffixes
pub struct NameGenerator {
    rng: Mutex<StdRng>,
}

impl NameGenerator {
    /// Seed from OS entropy. Create once and share.
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic generator for tests
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Random suffix of `NAME_SUFFIX_LEN` characters from `[0-9a-z]`
    pub fn suffix(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        (0..NAME_SUFFIX_LEN)
            .map(|_| NAME_ALPHABET[rng.gen_range(0..NAME_ALPHABET.len())] as char)
            .collect()
    }

    /// `<pool>-<suffix>`
    pub fn unit_name(&self, pool_name: &str) -> String {
        format!("{}-{}", pool_name, self.suffix())
    }
}

impl Default for NameGenerator {
    fn default() -> Self {
        Self::from_entropy()
    }
}

/// Build a new Pod for `pool` from its template.
///
/// Labels and spec are copied from the template as-is and the Pod gets a
/// controller owner reference back to the pool, so the garbage collector
/// removes it together with the pool. No Pod is built when the owner
/// reference cannot be formed.
pub fn build_unit(pool: &ReplicaPool, names: &NameGenerator) -> Result<Pod> {
    let pool_name = pool
        .meta()
        .name
        .clone()
        .ok_or_else(|| Error::ownership("ReplicaPool has no name"))?;

    let owner = pool.controller_owner_ref(&()).ok_or_else(|| {
        Error::ownership(format!(
            "cannot set controller reference for ReplicaPool {}: missing uid",
            pool_name
        ))
    })?;

    let labels = pool.spec.template_labels();

    Ok(Pod {
        metadata: ObjectMeta {
            name: Some(names.unit_name(&pool_name)),
            namespace: pool.namespace(),
            labels: (!labels.is_empty()).then_some(labels),
            owner_references: Some(vec![owner]),
            ..ObjectMeta::default()
        },
        spec: pool.spec.template.spec.clone(),
        status: None,
    })
}
