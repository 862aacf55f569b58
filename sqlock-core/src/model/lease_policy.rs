use sqlock_common::prelude::*;

use super::LockDescriptor;
use crate::dao::ClaimArgs;

/// Lease length a consumer asks for when it claims a lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpirationTimeout {
    /// The row expires this long after the claim, measured on the store's clock.
    Finite(Duration),
    /// The row never expires and is marked exclusive: only an explicit unlock by the holder frees
    /// it. If the holder cannot reach the store to unlock, nobody else gets the lock.
    Infinite,
}

impl ExpirationTimeout {
    pub const INFINITE_MILLIS: i64 = -1;
    pub const DEFAULT: ExpirationTimeout = ExpirationTimeout::Finite(Duration::from_millis(60_000));

    /// Negative values mean infinite, zero is prohibited.
    pub fn from_millis(millis: i64) -> SqlockResult<Self> {
        ensure_valid!(millis != 0, "Zero timeout prohibited.");
        if millis < 0 {
            Ok(Self::Infinite)
        } else {
            Ok(Self::Finite(Duration::from_millis(millis as u64)))
        }
    }

    pub fn finite(timeout: Duration) -> SqlockResult<Self> {
        let timeout = Self::Finite(timeout);
        timeout.validate()?;
        Ok(timeout)
    }

    pub fn validate(&self) -> SqlockResult<()> {
        if let Self::Finite(timeout) = self {
            ensure_valid!(timeout.as_millis() > 0, "Zero timeout prohibited.");
        }
        Ok(())
    }

    /// `-1` for an infinite lease, otherwise a positive amount of milliseconds.
    pub fn as_millis(&self) -> i64 {
        match self {
            Self::Finite(timeout) => i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX),
            Self::Infinite => Self::INFINITE_MILLIS,
        }
    }

    pub fn is_exclusive(&self) -> bool {
        self.as_millis() < 0
    }
}

impl Default for ExpirationTimeout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Turns an expiration timeout into the `(lease, exclusive)` pair written to the store.
///
/// An infinite lease is stored as a zero-length lease plus the exclusive bit: the bit alone keeps
/// the row from being reclaimed, the expiry time is irrelevant while it is set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LeasePolicy {
    expiration_timeout: ExpirationTimeout,
}

impl LeasePolicy {
    pub fn new(expiration_timeout: ExpirationTimeout) -> SqlockResult<Self> {
        expiration_timeout.validate()?;
        Ok(Self { expiration_timeout })
    }

    pub fn exclusive() -> Self {
        Self {
            expiration_timeout: ExpirationTimeout::Infinite,
        }
    }

    pub fn expiration_timeout(&self) -> ExpirationTimeout {
        self.expiration_timeout
    }

    pub fn is_exclusive(&self) -> bool {
        self.expiration_timeout.is_exclusive()
    }

    pub fn lease_millis(&self) -> i64 {
        self.expiration_timeout.as_millis().max(0)
    }

    pub fn claim_args(&self, descriptor: &LockDescriptor) -> ClaimArgs {
        ClaimArgs {
            lock_id: descriptor.lock_id().clone(),
            consumer_id: descriptor.consumer_id().clone(),
            lease_millis: self.lease_millis(),
            exclusive: self.is_exclusive(),
        }
    }
}
