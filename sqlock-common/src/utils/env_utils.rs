use std::env;
use std::fmt::Display;
use std::str::FromStr;

use strum_macros::{AsRefStr, Display as StrumDisplay, EnumString};

use crate::prelude::*;

pub struct EnvUtils;

impl EnvUtils {
    pub fn get(param: EnvParameter) -> Option<InlineStr> {
        match env::var(param.as_ref()) {
            Ok(v) if !v.trim().is_empty() => Some(v.trim().into()),
            _ => None,
        }
    }

    pub fn get_parsed<T>(param: EnvParameter) -> SqlockResult<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        match Self::get(param) {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).or_else(|e| {
                fmt_err!(
                    ValidationError,
                    "environment variable {} = {:?} is invalid: {}",
                    param,
                    raw.as_str(),
                    e
                )
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, AsRefStr, StrumDisplay)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvParameter {
    SqlockRetryCount,
    SqlockRetryDelayMs,
    SqlockExpirationTimeoutMs,
    SqlockTableName,
}
