use serde::Deserialize;
use sqlock_common::prelude::*;
use sqlock_common::{EnvParameter, EnvUtils};

use crate::dialect::LockTable;
use crate::model::{ExpirationTimeout, LeasePolicy, RetryPolicy};

/// Tunables shared by every lock a process creates.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LockProperties {
    /// Additional attempts after the first failed claim, also the release retry budget.
    pub retry_count: i64,
    /// Pause between attempts.
    pub retry_delay_ms: i64,
    /// Lease length; negative means an exclusive lock that never expires, zero is invalid.
    pub expiration_timeout_ms: i64,
    pub table_name: String,
}

impl LockProperties {
    /// Defaults overlaid with the `SQLOCK_*` environment variables that are set.
    pub fn from_env() -> SqlockResult<Self> {
        let mut properties = Self::default();
        if let Some(v) = EnvUtils::get_parsed(EnvParameter::SqlockRetryCount)? {
            properties.retry_count = v;
        }
        if let Some(v) = EnvUtils::get_parsed(EnvParameter::SqlockRetryDelayMs)? {
            properties.retry_delay_ms = v;
        }
        if let Some(v) = EnvUtils::get_parsed(EnvParameter::SqlockExpirationTimeoutMs)? {
            properties.expiration_timeout_ms = v;
        }
        if let Some(v) = EnvUtils::get(EnvParameter::SqlockTableName) {
            properties.table_name = v.to_string();
        }
        properties.validate()?;
        Ok(properties)
    }

    pub fn validate(&self) -> SqlockResult<()> {
        self.retry_policy()?;
        self.lease_policy()?;
        self.lock_table()?;
        Ok(())
    }

    pub fn retry_policy(&self) -> SqlockResult<RetryPolicy> {
        ensure_valid!(self.retry_count >= 0, "Expected non-negative retry count.");
        ensure_valid!(self.retry_delay_ms > 0, "Positive delay expected.");
        let retry_count = u32::try_from(self.retry_count).or_else(|_| {
            fmt_err!(ValidationError, "Retry count {} is too large.", self.retry_count)
        })?;
        RetryPolicy::new(retry_count, Duration::from_millis(self.retry_delay_ms as u64))
    }

    pub fn lease_policy(&self) -> SqlockResult<LeasePolicy> {
        LeasePolicy::new(ExpirationTimeout::from_millis(self.expiration_timeout_ms)?)
    }

    pub fn lock_table(&self) -> SqlockResult<LockTable> {
        LockTable::new(&self.table_name)
    }
}

impl Default for LockProperties {
    fn default() -> Self {
        Self {
            retry_count: RetryPolicy::DEFAULT_RETRY_COUNT as i64,
            retry_delay_ms: RetryPolicy::DEFAULT_RETRY_DELAY.as_millis() as i64,
            expiration_timeout_ms: ExpirationTimeout::DEFAULT.as_millis(),
            table_name: LockTable::DEFAULT_NAME.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    use super::*;

    #[test]
    fn defaults() {
        let properties = LockProperties::default();
        assert_eq!(properties.retry_count, 3);
        assert_eq!(properties.retry_delay_ms, 1_000);
        assert_eq!(properties.expiration_timeout_ms, 60_000);
        assert_eq!(properties.table_name, "locks");
        assert!(properties.validate().is_ok());
    }

    #[test]
    fn invalid_values_are_rejected_locally() {
        let cases = [
            LockProperties {
                retry_count: -1,
                ..Default::default()
            },
            LockProperties {
                retry_delay_ms: 0,
                ..Default::default()
            },
            LockProperties {
                expiration_timeout_ms: 0,
                ..Default::default()
            },
            LockProperties {
                table_name: "locks where 1=1".to_string(),
                ..Default::default()
            },
        ];
        for properties in cases {
            assert_eq!(
                properties.validate().unwrap_err().code(),
                ErrorCode::ValidationErrorCode(),
                "{:?}",
                properties
            );
        }
    }

    #[test]
    fn negative_timeout_means_exclusive() {
        let properties = LockProperties {
            expiration_timeout_ms: -5,
            ..Default::default()
        };
        assert!(properties.lease_policy().unwrap().is_exclusive());
    }

    // The only test in this crate touching SQLOCK_* variables.
    #[test]
    fn environment_overrides_defaults() {
        env::set_var("SQLOCK_RETRY_COUNT", "0");
        env::set_var("SQLOCK_RETRY_DELAY_MS", "25");
        env::set_var("SQLOCK_TABLE_NAME", "app.locks");
        let properties = LockProperties::from_env();
        env::set_var("SQLOCK_EXPIRATION_TIMEOUT_MS", "0");
        let invalid = LockProperties::from_env();
        for name in [
            "SQLOCK_RETRY_COUNT",
            "SQLOCK_RETRY_DELAY_MS",
            "SQLOCK_TABLE_NAME",
            "SQLOCK_EXPIRATION_TIMEOUT_MS",
        ] {
            env::remove_var(name);
        }

        let properties = properties.unwrap();
        assert_eq!(properties.retry_count, 0);
        assert_eq!(properties.retry_delay_ms, 25);
        assert_eq!(properties.expiration_timeout_ms, 60_000);
        assert_eq!(properties.table_name, "app.locks");
        assert!(invalid.is_err());
    }
}
