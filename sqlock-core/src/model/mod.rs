mod lease_policy;
mod lease_record;
mod lock_descriptor;

pub use lease_policy::{ExpirationTimeout, LeasePolicy};
pub use lease_record::LeaseRecord;
pub use lock_descriptor::{LockDescriptor, LockDescriptorBuilder, RetryPolicy};
