use chrono::{DateTime, Utc};
use sqlock_common::prelude::*;

use super::{LockStatement, StatementExecutor, StatementKind};
use crate::model::LeaseRecord;

/// Lease table kept in process memory.
///
/// Applies the claim, insert and release predicates of the SQL dialects under a single mutex, so
/// every statement is atomic the same way a single SQL statement is. The store clock can be moved
/// forward and failures can be injected, which makes it the executor of choice for tests and for
/// single-process deployments.
#[derive(Default)]
pub struct MemoryLeaseStore {
    records: Mutex<HashMap<String, LeaseRecord>>,
    clock_offset_ms: Mutex<i64>,
    pending_failures: AtomicUsize,
    executed: Mutex<HashMap<StatementKind, u64>>,
}

impl MemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The store's clock. All expiry arithmetic uses it, never the caller's. Saturates at the
    /// largest representable instant.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock().unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn clock(&self) -> Option<DateTime<Utc>> {
        Utc::now().checked_add_signed(chrono::Duration::milliseconds(*self.clock_offset_ms.lock()))
    }

    /// Moves the store clock forward.
    pub fn advance(&self, by: Duration) {
        let by = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        let mut offset = self.clock_offset_ms.lock();
        *offset = offset.saturating_add(by);
    }

    /// Makes the next `count` statements fail with a `StoreError`.
    pub fn fail_next(&self, count: usize) {
        self.pending_failures.fetch_add(count, AtomicOrdering::SeqCst);
    }

    pub fn record(&self, lock_id: &str) -> Option<LeaseRecord> {
        self.records.lock().get(lock_id).cloned()
    }

    /// Statements of `kind` received so far, failed ones included.
    pub fn executed(&self, kind: StatementKind) -> u64 {
        self.executed.lock().get(&kind).copied().unwrap_or(0)
    }

    fn take_failure(&self) -> bool {
        self.pending_failures
            .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| {
                n.checked_sub(1)
            })
            .is_ok()
    }
}

impl StatementExecutor for MemoryLeaseStore {
    fn execute(&self, statement: &LockStatement) -> SqlockResult<u64> {
        *self.executed.lock().entry(statement.kind()).or_insert(0) += 1;
        if self.take_failure() {
            return fmt_err!(
                StoreError,
                "injected failure executing {} for lock {}",
                statement.kind(),
                statement.args().lock_id
            );
        }

        let args = statement.args();
        let out_of_range = || {
            ErrorCode::StoreError(format!(
                "{} for lock {}: lease of {} ms is out of the store's time range",
                statement.kind(),
                args.lock_id,
                args.lease_millis
            ))
        };
        let now = self.clock().ok_or_else(out_of_range)?;
        let expires_at = now
            .checked_add_signed(chrono::Duration::milliseconds(args.lease_millis))
            .ok_or_else(out_of_range)?;
        let mut records = self.records.lock();

        let affected = match statement.kind() {
            StatementKind::ClaimUpdate => match records.get_mut(args.lock_id.as_str()) {
                Some(record) if record.is_claimable_by(&args.consumer_id, now) => {
                    record.consumer_id = args.consumer_id.to_string();
                    record.expires_at = expires_at;
                    record.exclusive = args.exclusive;
                    1
                }
                _ => 0,
            },
            StatementKind::ClaimInsert => {
                if records.contains_key(args.lock_id.as_str()) {
                    0
                } else {
                    records.insert(
                        args.lock_id.to_string(),
                        LeaseRecord {
                            lock_id: args.lock_id.to_string(),
                            consumer_id: args.consumer_id.to_string(),
                            expires_at,
                            exclusive: args.exclusive,
                        },
                    );
                    1
                }
            }
            StatementKind::Release => match records.get_mut(args.lock_id.as_str()) {
                Some(record) if record.consumer_id == args.consumer_id.as_str() => {
                    record.expires_at = expires_at;
                    record.exclusive = args.exclusive;
                    1
                }
                _ => 0,
            },
        };
        trace!(
            "{} on {} by {} affected {} row(s)",
            statement.kind(),
            args.lock_id,
            args.consumer_id,
            affected
        );
        Ok(affected)
    }
}
