mod sync;

pub use sync::{Condition, DatabaseLock, InterruptSignal, Lock};
