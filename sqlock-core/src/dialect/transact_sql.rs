use super::{LockTable, QueryAdapter};
use crate::dao::{ClaimArgs, LockStatement, SqlParam, StatementKind};

/// Microsoft SQL Server. Expects `expires_at DATETIME` and `exclusive BIT`/`INT`.
///
/// Parameters are `@p1` lock id, `@p2` consumer id, `@p3` lease in milliseconds, `@p4` exclusive
/// bit. `DATEADD` takes an `int`, so leases are limited to about 24 days.
#[derive(Clone, Debug, Default)]
pub struct TransactSqlQueryAdapter {
    table: LockTable,
}

impl TransactSqlQueryAdapter {
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

impl QueryAdapter for TransactSqlQueryAdapter {
    fn dialect(&self) -> &'static str {
        "transact-sql"
    }

    fn build_claim_update(&self, args: &ClaimArgs) -> LockStatement {
        let sql = format!(
            "UPDATE {} SET consumer_id = @p2, expires_at = DATEADD(ms, @p3, GETDATE()), exclusive = @p4 \
             WHERE lock_id = @p1 AND ((consumer_id <> @p2 AND expires_at <= GETDATE() AND exclusive = 0) OR consumer_id = @p2)",
            self.table
        );
        LockStatement::new(StatementKind::ClaimUpdate, args.clone(), sql, Self::params(args))
    }

    fn build_claim_insert(&self, args: &ClaimArgs) -> LockStatement {
        // UPDLOCK/HOLDLOCK keeps two racing inserts from both passing the NOT EXISTS check.
        let sql = format!(
            "INSERT INTO {0} (lock_id, consumer_id, expires_at, exclusive) \
             SELECT @p1, @p2, DATEADD(ms, @p3, GETDATE()), @p4 \
             WHERE NOT EXISTS (SELECT 1 FROM {0} WITH (UPDLOCK, HOLDLOCK) WHERE lock_id = @p1)",
            self.table
        );
        LockStatement::new(StatementKind::ClaimInsert, args.clone(), sql, Self::params(args))
    }

    fn build_release(&self, lock_id: &str, consumer_id: &str) -> LockStatement {
        let args = ClaimArgs::release(lock_id, consumer_id);
        let sql = format!(
            "UPDATE {} SET consumer_id = @p2, expires_at = DATEADD(ms, @p3, GETDATE()), exclusive = @p4 \
             WHERE lock_id = @p1 AND consumer_id = @p2",
            self.table
        );
        let params = Self::params(&args);
        LockStatement::new(StatementKind::Release, args, sql, params)
    }
}
