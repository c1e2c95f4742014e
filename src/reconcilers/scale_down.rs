//! Victim selection when a pool has more Pods than it wants

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;

use crate::error::{Error, Result};

/// Order in which surplus Pods are deleted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScaleDownPolicy {
    /// Oldest creation timestamp first, then name
    #[default]
    OldestFirst,
    /// Newest creation timestamp first, then name
    NewestFirst,
    /// Whatever order the API server listed the Pods in
    ListingOrder,
}

impl FromStr for ScaleDownPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "oldest-first" => Ok(ScaleDownPolicy::OldestFirst),
            "newest-first" => Ok(ScaleDownPolicy::NewestFirst),
            "listing-order" => Ok(ScaleDownPolicy::ListingOrder),
            other => Err(Error::config(format!(
                "Invalid scale-down policy '{}': must be one of: \
                 oldest-first, newest-first, listing-order",
                other
            ))),
        }
    }
}

impl fmt::Display for ScaleDownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScaleDownPolicy::OldestFirst => "oldest-first",
            ScaleDownPolicy::NewestFirst => "newest-first",
            ScaleDownPolicy::ListingOrder => "listing-order",
        };
        f.write_str(s)
    }
}

fn created_at(pod: &Pod) -> Option<DateTime<Utc>> {
    pod.metadata.creation_timestamp.as_ref().map(|t| t.0)
}

/// Pods without a timestamp sort after those with one
fn by_time(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>, newest_first: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if newest_first => b.cmp(&a),
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Names of the first `count` Pods to delete under `policy`
pub fn select_victims(units: &[Pod], count: usize, policy: ScaleDownPolicy) -> Vec<String> {
    let mut ordered: Vec<&Pod> = units.iter().collect();

    match policy {
        ScaleDownPolicy::ListingOrder => {}
        ScaleDownPolicy::OldestFirst | ScaleDownPolicy::NewestFirst => {
            let newest_first = policy == ScaleDownPolicy::NewestFirst;
            ordered.sort_by(|a, b| {
                by_time(created_at(a), created_at(b), newest_first)
                    .then_with(|| a.name_any().cmp(&b.name_any()))
            });
        }
    }

    ordered
        .into_iter()
        .take(count)
        .map(|pod| pod.name_any())
        .collect()
}
