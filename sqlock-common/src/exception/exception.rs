use std::backtrace::{Backtrace, BacktraceStatus};
use std::sync::Arc;

use thiserror::Error;

pub type SqlockResult<T> = std::result::Result<T, ErrorCode>;

type Cause = Box<dyn std::error::Error + Sync + Send>;

/// Error of every fallible lock operation: a numeric kind (see `exception_code.rs`), a message,
/// and the driver or executor error behind it when there is one.
#[derive(Error)]
pub struct ErrorCode {
    code: u16,
    display_text: String,
    cause: Option<Cause>,
    backtrace: Arc<Backtrace>,
}

impl ErrorCode {
    pub(crate) fn create(code: u16, display_text: String) -> ErrorCode {
        ErrorCode {
            code,
            display_text,
            cause: None,
            backtrace: Arc::new(Backtrace::capture()),
        }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn display_text(&self) -> &str {
        &self.display_text
    }

    /// Display text followed by the cause, if any.
    pub fn message(&self) -> String {
        match &self.cause {
            Some(cause) => format!("{}\n{:?}", self.display_text, cause),
            None => self.display_text.clone(),
        }
    }

    pub fn cause(&self) -> Option<&(dyn std::error::Error + Sync + Send + 'static)> {
        self.cause.as_deref()
    }

    /// Attaches the underlying error, keeping code and display text.
    pub fn with_cause(mut self, cause: impl std::error::Error + Sync + Send + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

impl std::fmt::Debug for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Code: {}, displayText = {}.", self.code(), self.message())?;
        if self.backtrace.status() == BacktraceStatus::Captured {
            write!(f, "\n\n{}", self.backtrace)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Code: {}, displayText = {}.", self.code(), self.message())
    }
}
