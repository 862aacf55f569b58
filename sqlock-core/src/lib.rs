//! Lease-based distributed mutex on top of a shared SQL table.
//!
//! Processes that share nothing but a database agree on ownership of a named lock through one
//! row per lock id. Claims and releases are single conditional writes, so no coordination service
//! is needed; leases expire on the database's clock, so a crashed holder cannot wedge a lock.

mod config;
mod dao;
mod dialect;
mod metrics;
mod model;
mod runtime;
mod service;
mod utils;

pub use config::LockProperties;
pub use dao::{
    ClaimArgs, LockStatement, MemoryLeaseStore, SqlParam, SqlxStatementExecutor,
    StatementExecutor, StatementKind,
};
pub use dialect::{
    LockTable, MySqlQueryAdapter, PostgresQueryAdapter, QueryAdapter, SqliteQueryAdapter,
    TransactSqlQueryAdapter,
};
pub use model::{
    ExpirationTimeout, LeasePolicy, LeaseRecord, LockDescriptor, LockDescriptorBuilder,
    RetryPolicy,
};
pub use runtime::{Condition, DatabaseLock, InterruptSignal, Lock};
pub use service::{LockService, Route, SerialAccessPolicy};
pub use utils::IdGenerator;
