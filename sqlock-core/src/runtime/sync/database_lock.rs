use std::thread;

use sqlock_common::prelude::*;

use super::{InterruptSignal, Lock};
use crate::config::LockProperties;
use crate::dao::{LockStatement, StatementExecutor, StatementKind};
use crate::dialect::QueryAdapter;
use crate::metrics::Monitors;
use crate::model::{ExpirationTimeout, LeasePolicy, LockDescriptor, RetryPolicy};

/// Lease-based mutex whose only shared state is one row of a database table.
///
/// Acquisition polls with a fixed delay; each attempt is a conditional update of the row and, when
/// that matches nothing, a conditional insert. Both are single statements, so the database's
/// statement atomicity is the only synchronization between competing processes.
///
/// A consumer that already holds the lease can claim it again, which renews the lease. There is
/// no hold counter: one `unlock` releases the lock regardless of how often it was claimed.
pub struct DatabaseLock {
    descriptor: LockDescriptor,
    lease: LeasePolicy,
    adapter: Arc<dyn QueryAdapter>,
    executor: Arc<dyn StatementExecutor>,
    interrupt: InterruptSignal,
}

impl DatabaseLock {
    pub fn new(
        descriptor: LockDescriptor,
        lease: LeasePolicy,
        adapter: Arc<dyn QueryAdapter>,
        executor: Arc<dyn StatementExecutor>,
    ) -> Self {
        Self {
            descriptor,
            lease,
            adapter,
            executor,
            interrupt: InterruptSignal::new(),
        }
    }

    pub fn from_properties(
        lock_id: &str,
        properties: &LockProperties,
        adapter: Arc<dyn QueryAdapter>,
        executor: Arc<dyn StatementExecutor>,
    ) -> SqlockResult<Self> {
        let descriptor = LockDescriptor::builder(lock_id)
            .retry(properties.retry_policy()?)
            .build()?;
        Ok(Self::new(descriptor, properties.lease_policy()?, adapter, executor))
    }

    pub fn lock_id(&self) -> &str {
        self.descriptor.lock_id()
    }

    pub fn consumer_id(&self) -> &str {
        self.descriptor.consumer_id()
    }

    pub fn descriptor(&self) -> &LockDescriptor {
        &self.descriptor
    }

    pub fn retry_count(&self) -> u32 {
        self.descriptor.retry().retry_count()
    }

    pub fn set_retry_count(&mut self, retry_count: u32) {
        let retry = self.descriptor.retry().with_retry_count(retry_count);
        self.descriptor.set_retry(retry);
    }

    pub fn retry_delay(&self) -> Duration {
        self.descriptor.retry().retry_delay()
    }

    pub fn set_retry_delay(&mut self, retry_delay: Duration) -> SqlockResult<()> {
        let retry = RetryPolicy::new(self.retry_count(), retry_delay)?;
        self.descriptor.set_retry(retry);
        Ok(())
    }

    pub fn expiration_timeout(&self) -> ExpirationTimeout {
        self.lease.expiration_timeout()
    }

    /// A negative timeout makes later claims exclusive; the row can then only be freed by
    /// `unlock`, so a holder that loses its database connection keeps everybody else out.
    pub fn set_expiration_timeout(&mut self, expiration_timeout: ExpirationTimeout) -> SqlockResult<()> {
        self.lease = LeasePolicy::new(expiration_timeout)?;
        Ok(())
    }

    /// Handle to interrupt `lock_interruptibly` and `try_lock_for` from another thread.
    pub fn interrupt_signal(&self) -> InterruptSignal {
        self.interrupt.clone()
    }

    /// One claim: update an existing row, otherwise insert a new one.
    fn attempt_claim(&self) -> SqlockResult<bool> {
        let args = self.lease.claim_args(&self.descriptor);
        if self.execute(&self.adapter.build_claim_update(&args))? > 0 {
            return Ok(true);
        }
        Ok(self.execute(&self.adapter.build_claim_insert(&args))? > 0)
    }

    fn execute(&self, statement: &LockStatement) -> SqlockResult<u64> {
        self.executor.execute(statement).map_err(|e| {
            error!(
                "{} statement for lock {} by {} failed: {}",
                statement.kind(),
                self.lock_id(),
                self.consumer_id(),
                e
            );
            Monitors::record_store_error(self.lock_id(), statement.kind());
            let action = match statement.kind() {
                StatementKind::Release => "unlock",
                StatementKind::ClaimUpdate | StatementKind::ClaimInsert => "obtain lock",
            };
            ErrorCode::StoreError(format!(
                "Cannot {} {} by {}",
                action,
                self.lock_id(),
                self.consumer_id()
            ))
            .with_cause(e)
        })
    }

    fn acquired(&self, started: Instant) -> bool {
        debug!(
            "Thread {:?} acquired lock {} as {}.",
            thread::current().id(),
            self.lock_id(),
            self.consumer_id()
        );
        Monitors::record_acquire_lock(self.lock_id(), started.elapsed());
        true
    }

    fn unsuccessful(&self) -> bool {
        debug!(
            "Thread {:?} failed to acquire lock {} as {}.",
            thread::current().id(),
            self.lock_id(),
            self.consumer_id()
        );
        Monitors::record_acquire_lock_unsuccessful(self.lock_id());
        false
    }

    fn cancelled<T>(&self) -> SqlockResult<T> {
        debug!(
            "Acquisition of lock {} by {} interrupted.",
            self.lock_id(),
            self.consumer_id()
        );
        Monitors::record_acquire_lock_cancelled(self.lock_id());
        fmt_err!(
            Cancelled,
            "Acquisition of lock {} by {} interrupted",
            self.lock_id(),
            self.consumer_id()
        )
    }

    fn busy(&self, attempt: u64) {
        trace!(
            "Lock {} is busy for {} (attempt {}), retrying in {:?}.",
            self.lock_id(),
            self.consumer_id(),
            attempt,
            self.retry_delay()
        );
    }
}

impl Lock for DatabaseLock {
    fn lock(&self) -> SqlockResult<()> {
        let started = Instant::now();
        let mut attempt = 1;
        while !self.attempt_claim()? {
            self.busy(attempt);
            attempt += 1;
            thread::sleep(self.retry_delay());
        }
        self.acquired(started);
        Ok(())
    }

    /// The interrupt flag is checked after every failed attempt and lowered when it causes
    /// `Cancelled`. An interrupt during a pause ends the pause; one more attempt is made before the
    /// flag is honored.
    fn lock_interruptibly(&self) -> SqlockResult<()> {
        let started = Instant::now();
        let mut attempt = 1;
        while !self.attempt_claim()? {
            if self.interrupt.take() {
                return self.cancelled();
            }
            self.busy(attempt);
            attempt += 1;
            self.interrupt.sleep(self.retry_delay());
        }
        self.acquired(started);
        Ok(())
    }

    fn try_lock(&self) -> SqlockResult<bool> {
        let started = Instant::now();
        let mut retries = 0;
        while !self.attempt_claim()? {
            if retries >= self.retry_count() {
                return Ok(self.unsuccessful());
            }
            retries += 1;
            self.busy(retries as u64);
            thread::sleep(self.retry_delay());
        }
        Ok(self.acquired(started))
    }

    /// The deadline is sampled once on entry. Pauses never run past it, so a busy lock reports
    /// `false` after `timeout` plus at most one statement round trip.
    fn try_lock_for(&self, timeout: Duration) -> SqlockResult<bool> {
        let started = Instant::now();
        let deadline = started.checked_add(timeout);
        let mut attempt = 1;
        loop {
            if self.attempt_claim()? {
                return Ok(self.acquired(started));
            }
            if self.interrupt.take() {
                return self.cancelled();
            }
            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(self.unsuccessful());
                    }
                    self.retry_delay().min(deadline - now)
                }
                None => self.retry_delay(),
            };
            self.busy(attempt);
            attempt += 1;
            self.interrupt.sleep(pause);
        }
    }

    /// Zero affected rows is retried `retry_count` times, since it can also be a write that lost a
    /// race; it ends in `IllegalOwnershipState` when the row never turns out to be ours.
    fn unlock(&self) -> SqlockResult<()> {
        let release = self
            .adapter
            .build_release(self.lock_id(), self.consumer_id());
        let attempts = self.descriptor.retry().max_attempts();
        for attempt in 1..=attempts {
            if self.execute(&release)? > 0 {
                debug!(
                    "Thread {:?} released lock {} as {}.",
                    thread::current().id(),
                    self.lock_id(),
                    self.consumer_id()
                );
                Monitors::record_release_lock(self.lock_id());
                return Ok(());
            }
            trace!(
                "Release of lock {} by {} matched no row (attempt {}/{}).",
                self.lock_id(),
                self.consumer_id(),
                attempt,
                attempts
            );
            if attempt < attempts {
                thread::sleep(self.retry_delay());
            }
        }
        warn!(
            "Lock {} is not held by {}, release failed after {} attempts.",
            self.lock_id(),
            self.consumer_id(),
            attempts
        );
        Monitors::record_illegal_ownership_state(self.lock_id());
        fmt_err!(
            IllegalOwnershipState,
            "Lock {} is not held by {}",
            self.lock_id(),
            self.consumer_id()
        )
    }
}

impl std::fmt::Debug for DatabaseLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseLock")
            .field("descriptor", &self.descriptor)
            .field("lease", &self.lease)
            .field("dialect", &self.adapter.dialect())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::MemoryLeaseStore;
    use crate::dialect::TransactSqlQueryAdapter;

    fn lock_on(store: &Arc<MemoryLeaseStore>) -> DatabaseLock {
        let descriptor = LockDescriptor::builder("orders")
            .retry_count(1)
            .retry_delay(Duration::from_millis(5))
            .build()
            .unwrap();
        DatabaseLock::new(
            descriptor,
            LeasePolicy::default(),
            Arc::new(TransactSqlQueryAdapter::default()),
            store.clone(),
        )
    }

    #[test]
    fn conditions_are_unsupported() {
        let lock = lock_on(&Arc::new(MemoryLeaseStore::new()));
        assert_eq!(
            lock.new_condition().unwrap_err().code(),
            ErrorCode::UnsupportedOperationCode()
        );
    }

    #[test]
    fn setters_validate_before_touching_the_store() {
        let store = Arc::new(MemoryLeaseStore::new());
        let mut lock = lock_on(&store);
        assert!(lock.set_retry_delay(Duration::ZERO).is_err());
        assert!(lock
            .set_expiration_timeout(ExpirationTimeout::Finite(Duration::ZERO))
            .is_err());
        assert_eq!(lock.retry_delay(), Duration::from_millis(5));
        assert_eq!(lock.expiration_timeout(), ExpirationTimeout::DEFAULT);

        lock.set_retry_count(7);
        lock.set_retry_delay(Duration::from_millis(9)).unwrap();
        lock.set_expiration_timeout(ExpirationTimeout::Infinite).unwrap();
        assert_eq!(lock.retry_count(), 7);
        assert_eq!(lock.retry_delay(), Duration::from_millis(9));
        assert_eq!(lock.expiration_timeout().as_millis(), -1);
        assert_eq!(store.executed(StatementKind::ClaimUpdate), 0);
    }

    #[test]
    fn first_claim_falls_through_to_insert() {
        let store = Arc::new(MemoryLeaseStore::new());
        let lock = lock_on(&store);
        assert!(lock.try_lock().unwrap());
        assert_eq!(store.executed(StatementKind::ClaimUpdate), 1);
        assert_eq!(store.executed(StatementKind::ClaimInsert), 1);

        // The row exists now; renewal stops at the update.
        assert!(lock.try_lock().unwrap());
        assert_eq!(store.executed(StatementKind::ClaimUpdate), 2);
        assert_eq!(store.executed(StatementKind::ClaimInsert), 1);
    }

    #[test]
    fn store_failure_is_not_retried() {
        let store = Arc::new(MemoryLeaseStore::new());
        let lock = lock_on(&store);
        store.fail_next(1);
        let err = lock.try_lock().unwrap_err();
        assert_eq!(err.code(), ErrorCode::StoreErrorCode());
        assert!(err.display_text().contains("Cannot obtain lock orders"));
        assert!(err.cause().is_some());
        assert_eq!(store.executed(StatementKind::ClaimUpdate), 1);
        assert_eq!(store.executed(StatementKind::ClaimInsert), 0);
    }

    #[test]
    fn debug_names_the_dialect() {
        let lock = lock_on(&Arc::new(MemoryLeaseStore::new()));
        let text = format!("{:?}", lock);
        assert!(text.contains("transact-sql"));
        assert!(text.contains("orders"));
    }
}
