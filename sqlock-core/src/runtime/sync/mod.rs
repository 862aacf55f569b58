mod database_lock;
mod interrupt;
mod lock;

pub use database_lock::DatabaseLock;
pub use interrupt::InterruptSignal;
pub use lock::{Condition, Lock};
