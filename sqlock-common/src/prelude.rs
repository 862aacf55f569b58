#[rustfmt::skip]
// std
pub use std::collections::{HashMap, HashSet, VecDeque};
pub use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
pub use std::sync::{Arc, Weak};
pub use std::time::{Duration, Instant};

#[rustfmt::skip]
pub type InlineStr = smartstring::SmartString<smartstring::Compact>;
pub use once_cell::sync::{Lazy, OnceCell};
pub use parking_lot::{Condvar, Mutex, RwLock};

#[rustfmt::skip]
pub use log::Level::{
    Debug as LogLevelDebug, Info as LogLevelInfo, Trace as LogLevelTrace, Warn as LogLevelWarn,
};
pub use log::{debug, error, info, log_enabled, trace, warn, LevelFilter};

#[rustfmt::skip]
pub use crate::{ensure_valid, fmt_err, str_err};
pub use crate::{ErrorCode, SqlockResult};
