use base58::ToBase58;
use sqlock_common::prelude::*;
use uuid::Uuid;

/// Consumer identity generator. Every lock instance gets one id for its whole life; the value is a
/// UUID v4 rendered in base58 so it stays short in the `consumer_id` column.
pub struct IdGenerator;

impl IdGenerator {
    pub fn generate_consumer_id() -> InlineStr {
        Uuid::new_v4().as_bytes().to_base58().into()
    }
}
