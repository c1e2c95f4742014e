//! ReplicaPool Custom Resource Definition

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::PodTemplateSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Smallest pool size accepted
pub const MIN_POOL_SIZE: i32 = 1;

/// Largest pool size accepted
pub const MAX_POOL_SIZE: i32 = 20;

/// Condition type reported on every ReplicaPool
pub const CONDITION_AVAILABLE: &str = "Available";

/// ReplicaPool resource specification
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "workloads.oso.sh",
    version = "v1alpha1",
    kind = "ReplicaPool",
    plural = "replicapools",
    singular = "replicapool",
    shortname = "rpool",
    namespaced,
    status = "ReplicaPoolStatus",
    printcolumn = r#"{"name": "Size", "type": "integer", "jsonPath": ".spec.size"}"#,
    printcolumn = r#"{"name": "Available", "type": "string", "jsonPath": ".status.conditions[?(@.type==\"Available\")].status"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaPoolSpec {
    /// Number of Pods the pool keeps running
    #[schemars(range(min = 1, max = 20))]
    pub size: i32,

    /// Label selector for the Pods owned by this pool.
    /// Falls back to the template labels when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,

    /// Template every Pod is created from
    #[serde(default)]
    pub template: PodTemplateSpec,
}

impl ReplicaPoolSpec {
    /// Labels carried by the Pod template (empty when unset)
    pub fn template_labels(&self) -> BTreeMap<String, String> {
        self.template
            .metadata
            .as_ref()
            .and_then(|m| m.labels.clone())
            .unwrap_or_default()
    }
}

/// ReplicaPool status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaPoolStatus {
    /// Pods observed on the last converged pass
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unit_names: Vec<String>,

    /// Status conditions, at most one per type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Condition status values
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Status condition
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type
    #[serde(rename = "type")]
    pub type_: String,

    /// Status (True, False, Unknown)
    pub status: ConditionStatus,

    /// Last time the status value changed
    pub last_transition_time: DateTime<Utc>,

    /// Machine-readable reason code
    #[serde(default)]
    pub reason: String,

    /// Human-readable message
    #[serde(default)]
    pub message: String,
}
