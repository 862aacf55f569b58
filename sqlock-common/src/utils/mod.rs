mod env_utils;

pub use env_utils::{EnvParameter, EnvUtils};
