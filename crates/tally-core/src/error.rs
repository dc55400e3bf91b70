//! Shared error type across tally crates.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::metric::MetricKind;

/// Stable error codes, used by the report binary and by tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Metric name does not match the identifier pattern.
    InvalidName,
    /// Metric name already registered.
    DuplicateName,
    /// Counter-style update with a negative delta.
    NegativeIncrement,
    /// Merge source and target are different metric kinds.
    MergeTypeMismatch,
    /// Registered metric has a different kind than the one requested.
    KindMismatch,
    /// Metric records could not be encoded.
    Encode,
    /// Metric records could not be decoded.
    Decode,
    /// Reading or writing a metrics file failed.
    Io,
    /// Configuration failed to parse or validate.
    InvalidConfig,
}

impl ErrorCode {
    /// String representation used in CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidName => "INVALID_NAME",
            ErrorCode::DuplicateName => "DUPLICATE_NAME",
            ErrorCode::NegativeIncrement => "NEGATIVE_INCREMENT",
            ErrorCode::MergeTypeMismatch => "MERGE_TYPE_MISMATCH",
            ErrorCode::KindMismatch => "KIND_MISMATCH",
            ErrorCode::Encode => "ENCODE",
            ErrorCode::Decode => "DECODE",
            ErrorCode::Io => "IO",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
        }
    }
}

/// One rejected entry of a merge batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    pub name: String,
    pub existing: MetricKind,
    pub incoming: MetricKind,
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (existing {}, incoming {})",
            self.name, self.existing, self.incoming
        )
    }
}

fn join_mismatches(list: &[TypeMismatch]) -> String {
    list.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, MetricError>;

/// Unified error type used by the core and the report binary.
#[derive(Debug, Error)]
pub enum MetricError {
    #[error("illegal metric name: {0:?}")]
    InvalidName(String),
    #[error("metric {0} has already been defined")]
    DuplicateName(String),
    #[error("counter {name} must be monotonically increasing (got {count})")]
    NegativeIncrement { name: String, count: i64 },
    #[error("cannot merge metrics of different types: {}", join_mismatches(.0))]
    MergeTypeMismatch(Vec<TypeMismatch>),
    #[error("metric {name} is a {found}, not a {expected}")]
    KindMismatch {
        name: String,
        expected: MetricKind,
        found: MetricKind,
    },
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl MetricError {
    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            MetricError::InvalidName(_) => ErrorCode::InvalidName,
            MetricError::DuplicateName(_) => ErrorCode::DuplicateName,
            MetricError::NegativeIncrement { .. } => ErrorCode::NegativeIncrement,
            MetricError::MergeTypeMismatch(_) => ErrorCode::MergeTypeMismatch,
            MetricError::KindMismatch { .. } => ErrorCode::KindMismatch,
            MetricError::Encode(_) => ErrorCode::Encode,
            MetricError::Decode(_) => ErrorCode::Decode,
            MetricError::Io { .. } => ErrorCode::Io,
            MetricError::InvalidConfig(_) => ErrorCode::InvalidConfig,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MetricError::Io {
            path: path.into(),
            source,
        }
    }
}
