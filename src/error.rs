use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::reader::ErrorKind;

/// Detail code attached to a reader failure.
///
/// The kind says what class of failure occurred; the code narrows down why.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// No additional detail
    None,

    /// Failure with no more specific code
    Uncategorized,

    /// The document could not be opened
    UnableToOpen,

    /// The document was opened but is not a valid capture document
    InvalidSlideDocument,

    /// A capture, position, channel, timepoint or plane index is out of range
    InvalidCaptureIndex,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::None => "none",
            ErrorCode::Uncategorized => "uncategorized failure",
            ErrorCode::UnableToOpen => "unable to open",
            ErrorCode::InvalidSlideDocument => "invalid slide document",
            ErrorCode::InvalidCaptureIndex => "invalid capture index",
        };
        f.write_str(name)
    }
}

/// A failure raised by a [`CaptureReader`](crate::reader::CaptureReader).
///
/// Readers only return this when their [`ErrorPolicy`](crate::reader::ErrorPolicy)
/// raises the failure kind; masked failures update the reader state instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} ({code}): {message}")]
pub struct ReaderError {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub message: String,
}

impl ReaderError {
    pub fn new(kind: ErrorKind, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
        }
    }

    /// An out-of-range index failure.
    pub fn invalid_index(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fail, ErrorCode::InvalidCaptureIndex, message)
    }
}

/// Errors that abort streaming of a whole capture.
///
/// Individual plane read failures are not errors at this level; they are
/// collected in the [`StreamReport`](crate::capture::StreamReport).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The capture-sized output buffer could not be obtained
    #[error("Failed to allocate plane buffer of {samples} samples")]
    Allocation { samples: usize },

    /// Requested position does not exist in the capture
    #[error("Position {position} out of range for capture {capture} ({count} positions)")]
    InvalidPosition {
        capture: u32,
        position: u32,
        count: u32,
    },

    /// Caller buffer cannot hold a full Z-stack
    #[error("Buffer too small: need {required} samples, got {actual}")]
    BufferTooSmall { required: usize, actual: usize },
}

/// Errors surfaced by the capture loader.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// A reader failure raised while assembling metadata
    #[error("Reader error: {0}")]
    Reader(#[from] ReaderError),

    /// Streaming of a capture was aborted
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),
}
