use ::metrics::{histogram, increment_counter};
use sqlock_common::prelude::*;

use crate::dao::StatementKind;

/// Lock counters published through the `metrics` facade. Nothing is recorded unless the host
/// process installs a recorder.
pub struct Monitors;

impl Monitors {
    pub fn record_acquire_lock(lock_id: &str, waited: Duration) {
        increment_counter!("sqlock_lock_acquired_total", "lock_id" => lock_id.to_string());
        histogram!(
            "sqlock_lock_acquire_wait_seconds",
            waited.as_secs_f64(),
            "lock_id" => lock_id.to_string()
        );
    }

    pub fn record_acquire_lock_unsuccessful(lock_id: &str) {
        increment_counter!("sqlock_lock_acquire_unsuccessful_total", "lock_id" => lock_id.to_string());
    }

    pub fn record_acquire_lock_cancelled(lock_id: &str) {
        increment_counter!("sqlock_lock_acquire_cancelled_total", "lock_id" => lock_id.to_string());
    }

    pub fn record_release_lock(lock_id: &str) {
        increment_counter!("sqlock_lock_released_total", "lock_id" => lock_id.to_string());
    }

    pub fn record_illegal_ownership_state(lock_id: &str) {
        increment_counter!("sqlock_lock_ownership_errors_total", "lock_id" => lock_id.to_string());
    }

    pub fn record_store_error(lock_id: &str, kind: StatementKind) {
        increment_counter!(
            "sqlock_store_errors_total",
            "lock_id" => lock_id.to_string(),
            "statement" => kind.to_string()
        );
    }
}
