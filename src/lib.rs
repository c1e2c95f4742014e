//! ReplicaPool Kubernetes Operator
//!
//! This operator keeps a pool of Pods at the size declared on a `ReplicaPool`
//! custom resource, creating and deleting Pods as needed.

pub mod config;
pub mod controllers;
pub mod crd;
pub mod error;
pub mod metrics;
pub mod reconcilers;
pub mod selector;
pub mod store;

pub use error::{Error, Result};
