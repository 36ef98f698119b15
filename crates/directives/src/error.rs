//! Error types for metadata parsing and search-space construction.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while preprocessing a kernel. All of them are fatal:
/// the search never starts on malformed input.
#[derive(Debug, Error)]
pub enum DirectiveError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("kernel metadata is empty (expected the top-level function on line 1)")]
    MissingTopFunction,

    #[error("line {line}: {detail}")]
    Malformed { line: usize, detail: String },

    #[error("line {line}: unknown action point kind `{kind}` (expected `loop` or `array`)")]
    UnknownKind { line: usize, kind: String },

    #[error("line {line}: cannot parse `{value}` as a count")]
    InvalidCount { line: usize, value: String },

    #[error("structural metadata is invalid: {0}")]
    Structure(#[from] serde_json::Error),

    #[error("action point {ordinal} has no candidate directives")]
    EmptyCandidateSet { ordinal: usize },

    #[error("configuration has {actual} values but the space has {expected} action points")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("value {value} for action point {ordinal} is outside [0, {upper}]")]
    OutOfDomain {
        ordinal: usize,
        value: usize,
        upper: usize,
    },
}

pub type DirectiveResult<T> = Result<T, DirectiveError>;
