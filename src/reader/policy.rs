//! Reader error state and propagation policy.
//!
//! A reader keeps a sticky [`ReadState`] describing every failure since the
//! last `clear()`. Whether a failure is also returned to the caller as an
//! `Err` is decided by the [`ErrorPolicy`] the reader was constructed with:
//! raised kinds become [`ReaderError`](crate::error::ReaderError)s, masked
//! kinds only update the state and the call yields zero, empty or `false`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

// =============================================================================
// Error Kinds
// =============================================================================

/// Class of a reader failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// End of data reached while extracting (also sets `Fail`)
    Eof,

    /// A valid field could not be extracted
    Fail,

    /// Loss of integrity of the underlying data
    Bad,

    /// The requested functionality is not implemented
    Unimplemented,

    /// Anything not covered above
    Uncategorized,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::Eof,
        ErrorKind::Fail,
        ErrorKind::Bad,
        ErrorKind::Unimplemented,
        ErrorKind::Uncategorized,
    ];

    /// Bit used for this kind in [`ReadState`] and [`ErrorPolicy`].
    pub const fn bit(self) -> u32 {
        match self {
            ErrorKind::Eof => 1 << 0,
            ErrorKind::Fail => 1 << 1,
            ErrorKind::Bad => 1 << 2,
            ErrorKind::Unimplemented => 1 << 3,
            ErrorKind::Uncategorized => 1 << 4,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ErrorKind::Eof => "eof",
            ErrorKind::Fail => "fail",
            ErrorKind::Bad => "bad",
            ErrorKind::Unimplemented => "unimplemented",
            ErrorKind::Uncategorized => "uncategorized",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ErrorKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "unknown error kind '{}' (expected one of: eof, fail, bad, unimplemented, uncategorized)",
                    s
                )
            })
    }
}

// =============================================================================
// Read State
// =============================================================================

/// Sticky set of failures observed by a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadState(u32);

impl ReadState {
    /// No failure recorded.
    pub const GOOD: ReadState = ReadState(0);

    pub fn is_good(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, kind: ErrorKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Record a failure. End of data always implies `Fail` as well.
    pub fn with(self, kind: ErrorKind) -> Self {
        let mut bits = self.0 | kind.bit();
        if kind == ErrorKind::Eof {
            bits |= ErrorKind::Fail.bit();
        }
        ReadState(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    /// Kinds recorded in this state, in bit order.
    pub fn kinds(self) -> impl Iterator<Item = ErrorKind> {
        ErrorKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }
}

// =============================================================================
// Error Policy
// =============================================================================

/// Which failure kinds a reader raises as `Err`.
///
/// The default policy masks everything: failures only update the reader
/// state and calls return zero, empty or `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorPolicy(u32);

impl ErrorPolicy {
    /// Raise nothing.
    pub const MASK_ALL: ErrorPolicy = ErrorPolicy(0);

    /// Raise every kind.
    pub const RAISE_ALL: ErrorPolicy = ErrorPolicy(
        ErrorKind::Eof.bit()
            | ErrorKind::Fail.bit()
            | ErrorKind::Bad.bit()
            | ErrorKind::Unimplemented.bit()
            | ErrorKind::Uncategorized.bit(),
    );

    pub fn raising(kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        kinds
            .into_iter()
            .fold(Self::MASK_ALL, |policy, kind| policy.with_raised(kind))
    }

    pub fn with_raised(self, kind: ErrorKind) -> Self {
        ErrorPolicy(self.0 | kind.bit())
    }

    pub fn with_masked(self, kind: ErrorKind) -> Self {
        ErrorPolicy(self.0 & !kind.bit())
    }

    pub fn raises(self, kind: ErrorKind) -> bool {
        self.0 & kind.bit() != 0
    }
}

// =============================================================================
// Tests
// =============================================================================
