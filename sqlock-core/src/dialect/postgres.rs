use super::{LockTable, QueryAdapter};
use crate::dao::{ClaimArgs, LockStatement, SqlParam, StatementKind};

/// PostgreSQL. Expects `expires_at TIMESTAMPTZ` and `exclusive SMALLINT`/`INTEGER`.
#[derive(Clone, Debug, Default)]
pub struct PostgresQueryAdapter {
    table: LockTable,
}

const EXPIRES_AT: &str = "now() + $3::double precision * INTERVAL '1 millisecond'";

impl PostgresQueryAdapter {
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

impl QueryAdapter for PostgresQueryAdapter {
    fn dialect(&self) -> &'static str {
        "postgres"
    }

    fn build_claim_update(&self, args: &ClaimArgs) -> LockStatement {
        let sql = format!(
            "UPDATE {} SET consumer_id = $2, expires_at = {}, exclusive = $4 \
             WHERE lock_id = $1 AND ((consumer_id <> $2 AND expires_at <= now() AND exclusive = 0) OR consumer_id = $2)",
            self.table, EXPIRES_AT
        );
        LockStatement::new(StatementKind::ClaimUpdate, args.clone(), sql, Self::params(args))
    }

    fn build_claim_insert(&self, args: &ClaimArgs) -> LockStatement {
        let sql = format!(
            "INSERT INTO {} (lock_id, consumer_id, expires_at, exclusive) VALUES ($1, $2, {}, $4) \
             ON CONFLICT (lock_id) DO NOTHING",
            self.table, EXPIRES_AT
        );
        LockStatement::new(StatementKind::ClaimInsert, args.clone(), sql, Self::params(args))
    }

    fn build_release(&self, lock_id: &str, consumer_id: &str) -> LockStatement {
        let args = ClaimArgs::release(lock_id, consumer_id);
        let sql = format!(
            "UPDATE {} SET consumer_id = $2, expires_at = {}, exclusive = $4 \
             WHERE lock_id = $1 AND consumer_id = $2",
            self.table, EXPIRES_AT
        );
        let params = Self::params(&args);
        LockStatement::new(StatementKind::Release, args, sql, params)
    }
}
