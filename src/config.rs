//! Operator configuration
//!
//! All settings come from environment variables so the operator can be
//! configured from its Deployment manifest.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::reconcilers::ScaleDownPolicy;

/// Default metrics port
pub const DEFAULT_METRICS_PORT: u16 = 8080;

const ENV_METRICS_PORT: &str = "METRICS_PORT";
const ENV_WATCH_NAMESPACE: &str = "WATCH_NAMESPACE";
const ENV_SCALE_DOWN_POLICY: &str = "SCALE_DOWN_POLICY";
const ENV_REQUEUE_DELAY_MS: &str = "REQUEUE_DELAY_MS";

/// Runtime configuration for the operator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Port for the metrics and health endpoints
    pub metrics_port: u16,

    /// Namespace to watch (None = all namespaces)
    pub watch_namespace: Option<String>,

    /// Order in which surplus Pods are removed
    pub scale_down_policy: ScaleDownPolicy,

    /// Delay used when a pass asks to be re-run right away
    pub requeue_delay: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            watch_namespace: None,
            scale_down_policy: ScaleDownPolicy::default(),
            requeue_delay: Duration::ZERO,
        }
    }
}

impl OperatorConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = non_empty(lookup(ENV_METRICS_PORT)) {
            config.metrics_port = port.parse().map_err(|e| {
                Error::config(format!("Invalid {} '{}': {}", ENV_METRICS_PORT, port, e))
            })?;
        }

        config.watch_namespace = non_empty(lookup(ENV_WATCH_NAMESPACE));

        if let Some(policy) = non_empty(lookup(ENV_SCALE_DOWN_POLICY)) {
            config.scale_down_policy = policy.parse()?;
        }

        if let Some(delay) = non_empty(lookup(ENV_REQUEUE_DELAY_MS)) {
            let millis: u64 = delay.parse().map_err(|e| {
                Error::config(format!("Invalid {} '{}': {}", ENV_REQUEUE_DELAY_MS, delay, e))
            })?;
            config.requeue_delay = Duration::from_millis(millis);
        }

        Ok(config)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
