//! Error types for simhost clients.
//!
//! Every failure a caller can see is one [`Error`]. [`Error::kind`] folds the
//! variants into the categories callers branch on, and [`Error::is_fatal`]
//! says whether the session that produced it is now unusable.

use simhost_math::MathError;

use crate::protocol::{
    STATUS_INVALID_INPUT, STATUS_INVALID_ITEM, STATUS_NOT_LICENSED, STATUS_STOPPED,
    STATUS_TARGET_UNREACHABLE,
};
use crate::wire::CodecError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] CodecError),

    #[error("Request timeout")]
    Timeout,

    #[error("Target not reachable: {0}")]
    TargetReach(String),

    #[error("Execution stopped: {0}")]
    Stopped(String),

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Not licensed: {0}")]
    License(String),

    #[error("Invalid item: {0}")]
    Item(String),

    #[error("Host error {status}: {message}")]
    Host { status: i32, message: String },

    #[error("Math error: {0}")]
    Math(#[from] MathError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Protocol,
    TargetReach,
    Stopped,
    Input,
    License,
    Item,
    Host,
}

impl Error {
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Map a non-zero reply status and its message to an error.
    ///
    /// Returns `None` for statuses that are not failures (`0` and the
    /// warning status `2`).
    #[must_use]
    pub fn from_status(status: i32, message: impl Into<String>) -> Option<Self> {
        let message = message.into();
        let err = match status {
            0 | 2 => return None,
            STATUS_INVALID_ITEM | -5 => Self::Item(message),
            STATUS_INVALID_INPUT | -3 => Self::Input(message),
            STATUS_NOT_LICENSED | -4 => Self::License(message),
            STATUS_TARGET_UNREACHABLE | -1 => Self::TargetReach(message),
            STATUS_STOPPED | -2 => Self::Stopped(message),
            _ => Self::Host { status, message },
        };
        Some(err)
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection(_) | Self::Timeout | Self::Io(_) => ErrorKind::Connection,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::TargetReach(_) => ErrorKind::TargetReach,
            Self::Stopped(_) => ErrorKind::Stopped,
            Self::Input(_) | Self::Math(_) | Self::Json(_) | Self::Config(_) => ErrorKind::Input,
            Self::License(_) => ErrorKind::License,
            Self::Item(_) => ErrorKind::Item,
            Self::Host { .. } => ErrorKind::Host,
        }
    }

    /// True when the session that raised this error is BROKEN.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Connection | ErrorKind::Protocol)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
