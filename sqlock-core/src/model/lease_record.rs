use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the lease table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    pub lock_id: String,
    pub consumer_id: String,
    pub expires_at: DateTime<Utc>,
    pub exclusive: bool,
}

impl LeaseRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Same predicate as the claim-by-update `WHERE` clause: an expired shared lease belonging to
    /// someone else, or any lease already owned by `consumer_id`.
    pub fn is_claimable_by(&self, consumer_id: &str, now: DateTime<Utc>) -> bool {
        self.consumer_id == consumer_id || (self.is_expired(now) && !self.exclusive)
    }
}
