use super::{LockTable, QueryAdapter};
use crate::dao::{ClaimArgs, LockStatement, SqlParam, StatementKind};

/// MySQL / MariaDB. Expects `expires_at DATETIME(6)` and `exclusive TINYINT`.
///
/// Placeholders are positional, so parameters repeat where the statement mentions a value twice.
/// Microsecond timestamps keep a renewal from writing identical values, which MySQL would report
/// as zero affected rows.
#[derive(Clone, Debug, Default)]
pub struct MySqlQueryAdapter {
    table: LockTable,
}

const EXPIRES_AT: &str = "TIMESTAMPADD(MICROSECOND, ? * 1000, NOW(6))";

impl MySqlQueryAdapter {
    pub fn new(table: LockTable) -> Self {
        Self { table }
    }

    fn set_params(args: &ClaimArgs) -> Vec<SqlParam> {
        vec![
            SqlParam::Text(args.consumer_id.clone()),
            SqlParam::BigInt(args.lease_millis),
            SqlParam::Int(args.exclusive_bit()),
            SqlParam::Text(args.lock_id.clone()),
        ]
    }
}

impl QueryAdapter for MySqlQueryAdapter {
    fn dialect(&self) -> &'static str {
        "mysql"
    }

    fn build_claim_update(&self, args: &ClaimArgs) -> LockStatement {
        let sql = format!(
            "UPDATE {} SET consumer_id = ?, expires_at = {}, exclusive = ? \
             WHERE lock_id = ? AND ((consumer_id <> ? AND expires_at <= NOW(6) AND exclusive = 0) OR consumer_id = ?)",
            self.table, EXPIRES_AT
        );
        let mut params = Self::set_params(args);
        params.push(SqlParam::Text(args.consumer_id.clone()));
        params.push(SqlParam::Text(args.consumer_id.clone()));
        LockStatement::new(StatementKind::ClaimUpdate, args.clone(), sql, params)
    }

    fn build_claim_insert(&self, args: &ClaimArgs) -> LockStatement {
        let sql = format!(
            "INSERT IGNORE INTO {} (lock_id, consumer_id, expires_at, exclusive) VALUES (?, ?, {}, ?)",
            self.table, EXPIRES_AT
        );
        let params = vec![
            SqlParam::Text(args.lock_id.clone()),
            SqlParam::Text(args.consumer_id.clone()),
            SqlParam::BigInt(args.lease_millis),
            SqlParam::Int(args.exclusive_bit()),
        ];
        LockStatement::new(StatementKind::ClaimInsert, args.clone(), sql, params)
    }

    fn build_release(&self, lock_id: &str, consumer_id: &str) -> LockStatement {
        let args = ClaimArgs::release(lock_id, consumer_id);
        let sql = format!(
            "UPDATE {} SET consumer_id = ?, expires_at = {}, exclusive = ? \
             WHERE lock_id = ? AND consumer_id = ?",
            self.table, EXPIRES_AT
        );
        let mut params = Self::set_params(&args);
        params.push(SqlParam::Text(args.consumer_id.clone()));
        LockStatement::new(StatementKind::Release, args, sql, params)
    }
}
