use sqlock_common::prelude::*;
use strum_macros::{AsRefStr, Display, EnumIter};

/// Values a claim or release statement is built from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimArgs {
    pub lock_id: InlineStr,
    pub consumer_id: InlineStr,
    /// Lease length added to the store's clock; negative values produce an already-expired row.
    pub lease_millis: i64,
    pub exclusive: bool,
}

impl ClaimArgs {
    pub const RELEASED_LEASE_MILLIS: i64 = -1;

    /// Arguments that expire `consumer_id`'s row right away and clear its exclusive bit. Clearing
    /// the bit is what lets the next claimant's update match after an infinite lease is released.
    pub fn release(lock_id: &str, consumer_id: &str) -> Self {
        Self {
            lock_id: lock_id.into(),
            consumer_id: consumer_id.into(),
            lease_millis: Self::RELEASED_LEASE_MILLIS,
            exclusive: false,
        }
    }

    pub fn exclusive_bit(&self) -> i32 {
        i32::from(self.exclusive)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, AsRefStr, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum StatementKind {
    ClaimUpdate,
    ClaimInsert,
    Release,
}

/// Bind parameter of a lock statement, in the order the dialect's placeholders expect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SqlParam {
    Text(InlineStr),
    BigInt(i64),
    Int(i32),
}

/// A parameterized conditional write against the lease table.
///
/// Besides the SQL text the statement keeps what it was built from, so executors that are not
/// SQL engines can apply the same semantics.
#[derive(Clone, Debug)]
pub struct LockStatement {
    kind: StatementKind,
    args: ClaimArgs,
    sql: String,
    params: Vec<SqlParam>,
}

impl LockStatement {
    pub fn new(kind: StatementKind, args: ClaimArgs, sql: String, params: Vec<SqlParam>) -> Self {
        Self {
            kind,
            args,
            sql,
            params,
        }
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn args(&self) -> &ClaimArgs {
        &self.args
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }
}
