use std::thread::{self, ThreadId};

use dashmap::DashMap;
use sqlock_common::prelude::*;

use crate::config::LockProperties;
use crate::dao::StatementExecutor;
use crate::dialect::QueryAdapter;
use crate::runtime::{DatabaseLock, Lock};

/// Process-wide entry point handing out one [`DatabaseLock`] per lock id and calling thread.
///
/// Every thread is its own consumer, so threads of one process exclude each other the same way
/// separate processes do. A lock has to be released by the thread that acquired it.
pub struct LockService {
    adapter: Arc<dyn QueryAdapter>,
    executor: Arc<dyn StatementExecutor>,
    properties: LockProperties,
    locks: DashMap<(String, ThreadId), Arc<DatabaseLock>>,
}

impl LockService {
    pub fn new(
        adapter: Arc<dyn QueryAdapter>,
        executor: Arc<dyn StatementExecutor>,
        properties: LockProperties,
    ) -> SqlockResult<Self> {
        properties.validate()?;
        info!(
            "lock service initialized on {} dialect with {:?}",
            adapter.dialect(),
            properties
        );
        Ok(Self {
            adapter,
            executor,
            properties,
            locks: DashMap::new(),
        })
    }

    pub fn properties(&self) -> &LockProperties {
        &self.properties
    }

    /// The calling thread's lock instance for `lock_id`.
    pub fn lock_for(&self, lock_id: &str) -> SqlockResult<Arc<DatabaseLock>> {
        let key = (lock_id.to_string(), thread::current().id());
        if let Some(lock) = self.locks.get(&key) {
            return Ok(Arc::clone(lock.value()));
        }
        let lock = Arc::new(DatabaseLock::from_properties(
            lock_id,
            &self.properties,
            Arc::clone(&self.adapter),
            Arc::clone(&self.executor),
        )?);
        Ok(Arc::clone(self.locks.entry(key).or_insert(lock).value()))
    }

    /// Tries to acquire the lock within the configured retry budget. Callers that can come back
    /// later (periodic sweeps, re-triggered work) should not block on a busy lock.
    pub fn acquire_lock(&self, lock_id: &str) -> SqlockResult<bool> {
        let acquired = self.lock_for(lock_id)?.try_lock()?;
        self.log_outcome(lock_id, acquired);
        Ok(acquired)
    }

    pub fn acquire_lock_try_time(&self, lock_id: &str, time_to_try: Duration) -> SqlockResult<bool> {
        let acquired = self.lock_for(lock_id)?.try_lock_for(time_to_try)?;
        self.log_outcome(lock_id, acquired);
        Ok(acquired)
    }

    pub fn release_lock(&self, lock_id: &str) -> SqlockResult<()> {
        self.lock_for(lock_id)?.unlock()?;
        debug!(
            "Thread {:?} released lock to lockId {}.",
            thread::current().id(),
            lock_id
        );
        Ok(())
    }

    fn log_outcome(&self, lock_id: &str, acquired: bool) {
        if acquired {
            debug!(
                "Thread {:?} acquired lock to lockId {}.",
                thread::current().id(),
                lock_id
            );
        } else {
            debug!(
                "Thread {:?} failed to acquire lock to lockId {}.",
                thread::current().id(),
                lock_id
            );
        }
    }
}
