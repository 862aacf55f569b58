use sqlock_common::prelude::*;

use crate::utils::IdGenerator;

/// How often and how patiently a consumer retries a claim that found the lock busy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one. Zero means a single attempt, which makes races
    /// between the update and the insert statement more likely to surface as a busy lock.
    retry_count: u32,
    retry_delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_RETRY_COUNT: u32 = 3;
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

    pub fn new(retry_count: u32, retry_delay: Duration) -> SqlockResult<Self> {
        ensure_valid!(!retry_delay.is_zero(), "Positive delay expected.");
        Ok(Self {
            retry_count,
            retry_delay,
        })
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn with_retry_count(self, retry_count: u32) -> Self {
        Self {
            retry_count,
            ..self
        }
    }

    /// First attempt plus retries.
    pub fn max_attempts(&self) -> u64 {
        self.retry_count as u64 + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_count: Self::DEFAULT_RETRY_COUNT,
            retry_delay: Self::DEFAULT_RETRY_DELAY,
        }
    }
}

/// Identity of one lock instance: which resource it guards, who is asking, and how it retries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockDescriptor {
    lock_id: InlineStr,
    consumer_id: InlineStr,
    retry: RetryPolicy,
}

impl LockDescriptor {
    /// Descriptor with a fresh consumer id and the default retry policy.
    pub fn new(lock_id: &str) -> SqlockResult<Self> {
        Self::builder(lock_id).build()
    }

    pub fn builder(lock_id: &str) -> LockDescriptorBuilder {
        LockDescriptorBuilder {
            lock_id: lock_id.into(),
            consumer_id: None,
            retry_count: RetryPolicy::DEFAULT_RETRY_COUNT,
            retry_delay: RetryPolicy::DEFAULT_RETRY_DELAY,
        }
    }

    pub fn lock_id(&self) -> &InlineStr {
        &self.lock_id
    }

    pub fn consumer_id(&self) -> &InlineStr {
        &self.consumer_id
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    pub(crate) fn set_retry(&mut self, retry: RetryPolicy) {
        self.retry = retry;
    }
}

pub struct LockDescriptorBuilder {
    lock_id: InlineStr,
    consumer_id: Option<InlineStr>,
    retry_count: u32,
    retry_delay: Duration,
}

impl LockDescriptorBuilder {
    /// Overrides the generated consumer id. Two instances sharing an id are the same owner as far
    /// as the store is concerned.
    pub fn consumer_id(mut self, consumer_id: &str) -> Self {
        self.consumer_id = Some(consumer_id.into());
        self
    }

    pub fn retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry_count = retry.retry_count();
        self.retry_delay = retry.retry_delay();
        self
    }

    pub fn build(self) -> SqlockResult<LockDescriptor> {
        ensure_valid!(!self.lock_id.is_empty(), "Non-empty lock identifier expected.");
        let consumer_id = match self.consumer_id {
            Some(id) => {
                ensure_valid!(!id.is_empty(), "Non-empty consumer identifier expected.");
                id
            }
            None => IdGenerator::generate_consumer_id(),
        };
        Ok(LockDescriptor {
            lock_id: self.lock_id,
            consumer_id,
            retry: RetryPolicy::new(self.retry_count, self.retry_delay)?,
        })
    }
}
