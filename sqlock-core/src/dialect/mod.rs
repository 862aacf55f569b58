//! Conditional-write statements per SQL backend.
//!
//! Every dialect emits the same three statements against a table with the columns `lock_id`
//! (key), `consumer_id`, `expires_at` and `exclusive`:
//!
//! * claim-by-update: take over the row if it is expired and shared, or already ours;
//! * claim-by-insert: create the row if there is none yet;
//! * release: expire our own row and clear its exclusive bit.
//!
//! The store's clock computes `expires_at`, so consumers never need synchronized clocks.

mod mysql;
mod postgres;
mod sqlite;
mod transact_sql;

use regex::Regex;
use sqlock_common::prelude::*;

pub use mysql::MySqlQueryAdapter;
pub use postgres::PostgresQueryAdapter;
pub use sqlite::SqliteQueryAdapter;
pub use transact_sql::TransactSqlQueryAdapter;

use crate::dao::{ClaimArgs, LockStatement};

/// Builds the backend-specific statements the acquisition engine runs.
pub trait QueryAdapter: Send + Sync {
    fn dialect(&self) -> &'static str;

    fn build_claim_update(&self, args: &ClaimArgs) -> LockStatement;

    fn build_claim_insert(&self, args: &ClaimArgs) -> LockStatement;

    /// Never inserts: a release that matches nothing means the caller does not hold the lock.
    fn build_release(&self, lock_id: &str, consumer_id: &str) -> LockStatement;
}

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").expect("valid regex")
});

/// Name of the lease table, optionally schema-qualified. Only plain identifiers are accepted since
/// the name is spliced into SQL text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockTable(InlineStr);

impl LockTable {
    pub const DEFAULT_NAME: &'static str = "locks";

    pub fn new(name: &str) -> SqlockResult<Self> {
        ensure_valid!(
            IDENTIFIER.is_match(name),
            "Invalid lock table name {:?}, expected [schema.]identifier.",
            name
        );
        Ok(Self(name.into()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self(Self::DEFAULT_NAME.into())
    }
}

impl std::fmt::Display for LockTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names() {
        assert_eq!(LockTable::default().name(), "locks");
        assert_eq!(LockTable::new("ops.app_locks").unwrap().to_string(), "ops.app_locks");
        for bad in ["", "1locks", "locks; drop table x", "a.b.c", "lo cks", "\"locks\""] {
            assert_eq!(
                LockTable::new(bad).unwrap_err().code(),
                ErrorCode::ValidationErrorCode(),
                "{}",
                bad
            );
        }
    }
}
