mod lock_service;
mod serial_access_policy;

pub use lock_service::LockService;
pub use serial_access_policy::{Route, SerialAccessPolicy};
