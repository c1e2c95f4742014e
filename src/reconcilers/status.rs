//! ReplicaPool status reporting
//!
//! Conditions are kept as a set keyed by type: setting a condition replaces
//! the existing record of that type, and the transition time only moves when
//! the status value changes.

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::crd::{Condition, ConditionStatus, ReplicaPool, CONDITION_AVAILABLE};
use crate::error::Result;
use crate::store::{guarded, PoolKey, ReplicaStore};

/// Reason recorded on every condition this operator writes
pub const REASON_RECONCILING: &str = "Reconciling";

/// Look up a condition by type
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Insert or replace the condition of type `type_`.
///
/// Returns true when anything about the condition changed.
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    type_: &str,
    status: ConditionStatus,
    reason: &str,
    message: &str,
    now: DateTime<Utc>,
) -> bool {
    match conditions.iter_mut().find(|c| c.type_ == type_) {
        Some(existing) => {
            let changed = existing.status != status
                || existing.reason != reason
                || existing.message != message;
            if existing.status != status {
                existing.status = status;
                existing.last_transition_time = now;
            }
            existing.reason = reason.to_string();
            existing.message = message.to_string();
            changed
        }
        None => {
            conditions.push(Condition {
                type_: type_.to_string(),
                status,
                last_transition_time: now,
                reason: reason.to_string(),
                message: message.to_string(),
            });
            true
        }
    }
}

/// Set the pool's `Available` condition
pub fn set_available(pool: &mut ReplicaPool, status: ConditionStatus, message: &str) {
    let pool_status = pool.status.get_or_insert_with(Default::default);
    set_condition(
        &mut pool_status.conditions,
        CONDITION_AVAILABLE,
        status,
        REASON_RECONCILING,
        message,
        Utc::now(),
    );
}

/// The pool's `Available` condition, if any
pub fn available_condition(pool: &ReplicaPool) -> Option<&Condition> {
    pool.status
        .as_ref()
        .and_then(|s| find_condition(&s.conditions, CONDITION_AVAILABLE))
}

/// Write the pool's status back to the store
pub async fn persist_status<S>(
    store: &S,
    pool: &ReplicaPool,
    cancel: &CancellationToken,
) -> Result<ReplicaPool>
where
    S: ReplicaStore + ?Sized,
{
    guarded(cancel, store.replace_pool_status(pool))
        .await
        .inspect_err(|e| {
            warn!(
                pool = %PoolKey::from_pool(pool),
                error = %e,
                "Failed to update ReplicaPool status"
            )
        })
}
