use crate::mapreduce::map_phase::ChunkFailure;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub mod codes;
pub mod helpers;

pub use codes::{describe_error_code, ErrorCode};
pub use helpers::ErrorExt;

pub type Result<T> = std::result::Result<T, WordTallyError>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Why a run was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The caller raised the cancellation token
    Requested,
    /// The configured run deadline elapsed
    Timeout {
        #[serde(with = "humantime_serde")]
        after: Duration,
    },
}

impl Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Requested => write!(f, "cancellation requested"),
            CancelReason::Timeout { after } => {
                write!(f, "deadline of {}s exceeded", after.as_secs_f64())
            }
        }
    }
}

/// The unified error type for wordtally
#[derive(Error, Debug)]
pub enum WordTallyError {
    #[error("[E{code:04}] Failed to fetch {location}: {message}")]
    Fetch {
        code: u16,
        location: String,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Document is not valid text: {message}")]
    Encoding {
        code: u16,
        message: String,
        /// Byte offset up to which the input was valid
        valid_up_to: usize,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Worker failure: {failure}")]
    WorkerFailure { code: u16, failure: ChunkFailure },

    #[error("[E{code:04}] Invalid argument `{field}`: {message}")]
    InvalidArgument {
        code: u16,
        field: String,
        message: String,
    },

    #[error("[E{code:04}] Run cancelled: {reason}")]
    Cancelled { code: u16, reason: CancelReason },

    #[error("[E{code:04}] Run aborted after {} chunk failure(s)", .failures.len())]
    AggregateFailure {
        code: u16,
        failures: Vec<ChunkFailure>,
    },

    #[error("[E{code:04}] Configuration error: {message}")]
    Config {
        code: u16,
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<BoxedSource>,
    },
}

/// Fieldless discriminant of [`WordTallyError`] for callers that branch on the kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Fetch,
    Encoding,
    WorkerFailure,
    InvalidArgument,
    Cancelled,
    AggregateFailure,
    Config,
}

impl WordTallyError {
    /// Create a fetch error with default code
    pub fn fetch(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::fetch_with_code(ErrorCode::FETCH_GENERIC, location, message)
    }

    /// Create a fetch error with specific code
    pub fn fetch_with_code(
        code: u16,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Fetch {
            code,
            location: location.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create an encoding error from a failed UTF-8 decode
    pub fn encoding(err: std::str::Utf8Error) -> Self {
        Self::Encoding {
            code: ErrorCode::ENCODING_INVALID_UTF8,
            message: format!("invalid UTF-8 sequence at byte {}", err.valid_up_to()),
            valid_up_to: err.valid_up_to(),
            source: Some(Box::new(err)),
        }
    }

    pub fn worker_failure(failure: ChunkFailure) -> Self {
        let code = if failure.panicked {
            ErrorCode::WORKER_PANICKED
        } else {
            ErrorCode::WORKER_FAILED
        };
        Self::WorkerFailure { code, failure }
    }

    /// Create an invalid argument error for a named field
    pub fn invalid_argument(code: u16, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            code,
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn cancelled(reason: CancelReason) -> Self {
        let code = match reason {
            CancelReason::Requested => ErrorCode::CANCELLED,
            CancelReason::Timeout { .. } => ErrorCode::TIMED_OUT,
        };
        Self::Cancelled { code, reason }
    }

    pub fn aggregate(failures: Vec<ChunkFailure>) -> Self {
        Self::AggregateFailure {
            code: ErrorCode::AGGREGATE_FAILURE,
            failures,
        }
    }

    /// Create a configuration error with default code
    pub fn config(message: impl Into<String>) -> Self {
        Self::config_with_code(ErrorCode::CONFIG_GENERIC, message, None)
    }

    /// Create a configuration error with specific code and path
    pub fn config_with_code(code: u16, message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Config {
            code,
            message: message.into(),
            path,
            source: None,
        }
    }

    /// Attach a source error. Variants without a source slot are returned unchanged.
    pub fn with_source(mut self, source: impl Into<BoxedSource>) -> Self {
        match &mut self {
            Self::Fetch { source: src, .. }
            | Self::Encoding { source: src, .. }
            | Self::Config { source: src, .. } => {
                *src = Some(source.into());
            }
            Self::WorkerFailure { .. }
            | Self::InvalidArgument { .. }
            | Self::Cancelled { .. }
            | Self::AggregateFailure { .. } => {}
        }
        self
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Fetch { code, .. }
            | Self::Encoding { code, .. }
            | Self::WorkerFailure { code, .. }
            | Self::InvalidArgument { code, .. }
            | Self::Cancelled { code, .. }
            | Self::AggregateFailure { code, .. }
            | Self::Config { code, .. } => *code,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch { .. } => ErrorKind::Fetch,
            Self::Encoding { .. } => ErrorKind::Encoding,
            Self::WorkerFailure { .. } => ErrorKind::WorkerFailure,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::AggregateFailure { .. } => ErrorKind::AggregateFailure,
            Self::Config { .. } => ErrorKind::Config,
        }
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::InvalidArgument { .. } => 3,
            Self::Fetch { .. } => 4,
            Self::Encoding { .. } => 5,
            Self::WorkerFailure { .. } | Self::AggregateFailure { .. } => 6,
            Self::Cancelled { .. } => 130,
        }
    }
}
