use sqlock_common::prelude::*;

use super::LockStatement;

/// Data-access capability the lock consumes: run one conditional write and report how many rows
/// it touched.
///
/// Implementations fail with `StoreError` on connectivity or statement errors and must not retry
/// on their own. No transaction or connection-reuse contract is assumed.
pub trait StatementExecutor: Send + Sync {
    fn execute(&self, statement: &LockStatement) -> SqlockResult<u64>;
}

impl<T: StatementExecutor + ?Sized> StatementExecutor for Arc<T> {
    fn execute(&self, statement: &LockStatement) -> SqlockResult<u64> {
        (**self).execute(statement)
    }
}
