use sqlock_common::prelude::*;
use sqlx::pool::PoolOptions;
use sqlx::{Database, MySql, Pool, Postgres, Sqlite};
use tokio::runtime::Handle;

use super::{LockStatement, SqlParam, StatementExecutor};

/// Runs lock statements on a sqlx connection pool.
///
/// The lock contract is blocking, so each statement is driven to completion on the given tokio
/// runtime with `Handle::block_on`. Call it from plain threads (or `spawn_blocking`), never from
/// inside an async task of the same runtime.
pub struct SqlxStatementExecutor<DB: Database> {
    pool: Pool<DB>,
    runtime: Handle,
}

impl<DB: Database> SqlxStatementExecutor<DB> {
    pub fn new(pool: Pool<DB>, runtime: Handle) -> Self {
        Self { pool, runtime }
    }

    /// Builds a pool that opens connections on first use.
    pub fn connect_lazy(url: &str, max_connections: u32, runtime: Handle) -> SqlockResult<Self> {
        // The pool spawns its maintenance tasks on the ambient runtime.
        let _guard = runtime.enter();
        let pool = PoolOptions::<DB>::new()
            .max_connections(max_connections)
            .connect_lazy(url)
            .map_err(|e| {
                ErrorCode::StoreError(format!("Cannot create connection pool: {}", e)).with_cause(e)
            })?;
        Ok(Self::new(pool, runtime))
    }

    pub fn pool(&self) -> &Pool<DB> {
        &self.pool
    }
}

fn store_error(statement: &LockStatement, error: sqlx::Error) -> ErrorCode {
    ErrorCode::StoreError(format!(
        "{} statement for lock {} failed: {}",
        statement.kind(),
        statement.args().lock_id,
        error
    ))
    .with_cause(error)
}

macro_rules! impl_statement_executor {
    ($($db:ty),*$(,)*) => {
        $(
        impl StatementExecutor for SqlxStatementExecutor<$db> {
            fn execute(&self, statement: &LockStatement) -> SqlockResult<u64> {
                let mut query = sqlx::query::<$db>(statement.sql());
                for param in statement.params() {
                    query = match param {
                        SqlParam::Text(value) => query.bind(value.as_str()),
                        SqlParam::BigInt(value) => query.bind(*value),
                        SqlParam::Int(value) => query.bind(*value),
                    };
                }
                self.runtime
                    .block_on(query.execute(&self.pool))
                    .map(|done| done.rows_affected())
                    .map_err(|e| store_error(statement, e))
            }
        }
        )*
    };
}

impl_statement_executor!(Postgres, MySql, Sqlite);
