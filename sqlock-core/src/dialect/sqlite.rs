use super::{LockTable, QueryAdapter};
use crate::dao::{ClaimArgs, LockStatement, SqlParam, StatementKind};

/// SQLite. Expects `expires_at INTEGER` holding Unix epoch milliseconds and `exclusive INTEGER`.
#[derive(Clone, Debug, Default)]
pub struct SqliteQueryAdapter {
    table: LockTable,
}

/// Epoch milliseconds from the julian day clock; `'now'` is stable within one statement.
const NOW_MS: &str = "CAST((julianday('now') - 2440587.5) * 86400000.0 AS INTEGER)";

impl SqliteQueryAdapter {
    pub fn new(table: LockTable) -> Self {
        Self { table }
    }

    fn params(args: &ClaimArgs) -> Vec<SqlParam> {
        vec![
            SqlParam::Text(args.lock_id.clone()),
            SqlParam::Text(args.consumer_id.clone()),
            SqlParam::BigInt(args.lease_millis),
            SqlParam::Int(args.exclusive_bit()),
        ]
    }
}

impl QueryAdapter for SqliteQueryAdapter {
    fn dialect(&self) -> &'static str {
        "sqlite"
    }

    fn build_claim_update(&self, args: &ClaimArgs) -> LockStatement {
        let sql = format!(
            "UPDATE {0} SET consumer_id = ?2, expires_at = {1} + ?3, exclusive = ?4 \
             WHERE lock_id = ?1 AND ((consumer_id <> ?2 AND expires_at <= {1} AND exclusive = 0) OR consumer_id = ?2)",
            self.table, NOW_MS
        );
        LockStatement::new(StatementKind::ClaimUpdate, args.clone(), sql, Self::params(args))
    }

    fn build_claim_insert(&self, args: &ClaimArgs) -> LockStatement {
        let sql = format!(
            "INSERT OR IGNORE INTO {} (lock_id, consumer_id, expires_at, exclusive) VALUES (?1, ?2, {} + ?3, ?4)",
            self.table, NOW_MS
        );
        LockStatement::new(StatementKind::ClaimInsert, args.clone(), sql, Self::params(args))
    }

    fn build_release(&self, lock_id: &str, consumer_id: &str) -> LockStatement {
        let args = ClaimArgs::release(lock_id, consumer_id);
        let sql = format!(
            "UPDATE {} SET consumer_id = ?2, expires_at = {} + ?3, exclusive = ?4 \
             WHERE lock_id = ?1 AND consumer_id = ?2",
            self.table, NOW_MS
        );
        let params = Self::params(&args);
        LockStatement::new(StatementKind::Release, args, sql, params)
    }
}
