//! Label selector handling for ReplicaPool Pods
//!
//! Turns a pool's `LabelSelector` into the query string sent to the API
//! server, and evaluates the same requirements locally.

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};

use crate::crd::ReplicaPool;
use crate::error::{Error, Result};

/// A single label requirement
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Requirement {
    Equals(String, String),
    In(String, Vec<String>),
    NotIn(String, Vec<String>),
    Exists(String),
    DoesNotExist(String),
}

impl Requirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Requirement::Equals(k, v) => labels.get(k) == Some(v),
            Requirement::In(k, values) => labels.get(k).is_some_and(|l| values.contains(l)),
            Requirement::NotIn(k, values) => labels.get(k).map_or(true, |l| !values.contains(l)),
            Requirement::Exists(k) => labels.contains_key(k),
            Requirement::DoesNotExist(k) => !labels.contains_key(k),
        }
    }

    fn from_expression(expr: &LabelSelectorRequirement) -> Result<Self> {
        let values = expr.values.clone().unwrap_or_default();
        let key = expr.key.clone();
        match expr.operator.as_str() {
            "In" | "NotIn" if values.is_empty() => Err(Error::validation(format!(
                "selector operator '{}' on key '{}' requires at least one value",
                expr.operator, key
            ))),
            "In" => Ok(Requirement::In(key, values)),
            "NotIn" => Ok(Requirement::NotIn(key, values)),
            "Exists" | "DoesNotExist" if !values.is_empty() => Err(Error::validation(format!(
                "selector operator '{}' on key '{}' must not have values",
                expr.operator, key
            ))),
            "Exists" => Ok(Requirement::Exists(key)),
            "DoesNotExist" => Ok(Requirement::DoesNotExist(key)),
            other => Err(Error::validation(format!(
                "unsupported selector operator '{}': must be one of In, NotIn, Exists, DoesNotExist",
                other
            ))),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Equals(k, v) => write!(f, "{}={}", k, v),
            Requirement::In(k, values) => write!(f, "{} in ({})", k, values.join(",")),
            Requirement::NotIn(k, values) => write!(f, "{} notin ({})", k, values.join(",")),
            Requirement::Exists(k) => write!(f, "{}", k),
            Requirement::DoesNotExist(k) => write!(f, "!{}", k),
        }
    }
}

/// Selector used to find the Pods that belong to a pool
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnitSelector {
    requirements: Vec<Requirement>,
}

impl UnitSelector {
    /// Build an equality-only selector from a label map
    pub fn from_labels(labels: &BTreeMap<String, String>) -> Self {
        let requirements = labels
            .iter()
            .map(|(k, v)| Requirement::Equals(k.clone(), v.clone()))
            .collect();
        Self { requirements }
    }

    /// Build a selector from a Kubernetes `LabelSelector`
    pub fn from_label_selector(selector: &LabelSelector) -> Result<Self> {
        let mut requirements: Vec<Requirement> = selector
            .match_labels
            .iter()
            .flatten()
            .map(|(k, v)| Requirement::Equals(k.clone(), v.clone()))
            .collect();

        for expr in selector.match_expressions.iter().flatten() {
            requirements.push(Requirement::from_expression(expr)?);
        }

        Ok(Self { requirements })
    }

    /// The selector a pool lists its Pods with.
    ///
    /// Uses `spec.selector` when it carries at least one requirement,
    /// otherwise the template labels.
    pub fn for_pool(pool: &ReplicaPool) -> Result<Self> {
        if let Some(selector) = &pool.spec.selector {
            let parsed = Self::from_label_selector(selector)?;
            if !parsed.is_empty() {
                return Ok(parsed);
            }
        }
        Ok(Self::from_labels(&pool.spec.template_labels()))
    }

    /// True when the selector has no requirements (matches everything)
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Evaluate the selector against a label set
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }

    /// Render as a list query `labelSelector` string
    pub fn to_query(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for UnitSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.requirements.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(","))
    }
}
