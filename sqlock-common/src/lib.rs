mod exception;
mod utils;

pub use utils::{EnvParameter, EnvUtils};

pub mod prelude;

#[macro_use]
pub(crate) mod macros;
#[rustfmt::skip]
pub use crate::exception::{ErrorCode, SqlockResult};
