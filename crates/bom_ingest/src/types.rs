use std::fmt;

use bom_core::PartCollection;

pub type RunId = u64;

/// Incremental output of a run, in publication order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunUpdate {
    /// The collection after an event changed it.
    Snapshot(PartCollection),
    /// The run completed; no further updates follow.
    Finished(RunSummary),
    /// The run failed fatally; no further updates follow.
    Failed(String),
}

impl RunUpdate {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunUpdate::Snapshot(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: RunId,
    pub total: usize,
    pub identified: usize,
    pub failed: usize,
    /// Records still `pending` or `searching` when the run ended.
    pub unresolved: usize,
    pub decode_warnings: usize,
    pub format_errors: usize,
    pub lookup_failures: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportFailure,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    InvalidBody,
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportFailure::InvalidUrl => write!(f, "invalid url"),
            TransportFailure::HttpStatus(code) => write!(f, "http status {code}"),
            TransportFailure::Timeout => write!(f, "timeout"),
            TransportFailure::Network => write!(f, "network error"),
            TransportFailure::InvalidBody => write!(f, "invalid response body"),
        }
    }
}

/// Byte-level problems in the frame stream. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameDecodeError {
    #[error("malformed UTF-8 in stream, replaced with U+FFFD")]
    MalformedBytes,
    #[error("discarded unterminated trailing frame ({len} bytes)")]
    UnterminatedFrame { len: usize },
    #[error("unterminated trailing frame produced no event: {reason}")]
    TrailingFrameRejected { reason: String },
}

/// A frame carried the data marker but its payload was unusable. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameFormatError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("payload is missing field `{0}`")]
    MissingField(&'static str),
    #[error("payload field `{field}` is invalid: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
}

/// Identification of one part failed; only that record is marked failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ItemLookupError {
    #[error("lookup request failed: {0}")]
    Transport(#[from] TransportError),
    #[error("lookup rejected: {0}")]
    Rejected(String),
    #[error("lookup returned unknown status `{0}`")]
    UnknownStatus(String),
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),
    #[error("unsupported upload `{file_name}`: expected an .xls or .xlsx file")]
    UnsupportedUpload { file_name: String },
    #[error("duplicate part number `{0}` in part list")]
    DuplicatePartNumber(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
