mod memory_lease_store;
mod sqlx_executor;
mod statement;
mod statement_executor;

pub use memory_lease_store::MemoryLeaseStore;
pub use sqlx_executor::SqlxStatementExecutor;
pub use statement::{ClaimArgs, LockStatement, SqlParam, StatementKind};
pub use statement_executor::StatementExecutor;
