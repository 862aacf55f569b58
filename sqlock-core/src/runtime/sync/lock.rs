use sqlock_common::prelude::*;

/// Interface implemented by a distributed lock client.
///
/// Mirrors a plain mutual-exclusion lock. Acquiring variants fail only when the backing store
/// fails (`StoreError`) or, for the interruptible ones, when interrupted (`Cancelled`); a busy
/// lock is never an error.
pub trait Lock: Send + Sync {
    /// Blocks until the lock is obtained.
    fn lock(&self) -> SqlockResult<()>;

    /// Like [`Lock::lock`], but gives up with `Cancelled` once interrupted.
    fn lock_interruptibly(&self) -> SqlockResult<()>;

    /// One attempt plus a bounded number of retries.
    fn try_lock(&self) -> SqlockResult<bool>;

    /// Keeps trying until the lock is obtained or `timeout` has passed.
    fn try_lock_for(&self, timeout: Duration) -> SqlockResult<bool>;

    /// Fails with `IllegalOwnershipState` if the caller does not hold the lock.
    fn unlock(&self) -> SqlockResult<()>;

    fn new_condition(&self) -> SqlockResult<Condition> {
        str_err!(
            UnsupportedOperation,
            "Conditions are not supported by distributed locks."
        )
    }
}

/// Condition variable of a [`Lock`]. Distributed locks cannot provide one, so the type has no
/// values.
#[derive(Debug)]
pub enum Condition {}
