//! Command-line configuration for the `sb-loader` binary.
//!
//! Options can also be set through environment variables with the `SBL_`
//! prefix:
//!
//! - `SBL_FILE` - Capture manifest to load
//! - `SBL_POSITION` - Position index streamed for every capture (default: 0)
//! - `SBL_MAX_TIMEPOINTS` - Stream at most this many timepoints
//! - `SBL_MASK` - Comma-separated error kinds the reader masks
//! - `SBL_FORMAT` - Report format, `text` or `json` (default: text)

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::loader::{LoadOptions, PositionSelection};
use crate::reader::{ErrorKind, ErrorPolicy};

// =============================================================================
// Default Values
// =============================================================================

/// Position streamed when none is given.
pub const DEFAULT_POSITION: u32 = 0;

/// Default log filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "sb_loader=info";

/// Log filter used with `--verbose`.
pub const VERBOSE_LOG_FILTER: &str = "sb_loader=debug";

// =============================================================================
// CLI Arguments
// =============================================================================

/// Report format written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Capture headers, details and per-stack progress
    Text,

    /// One JSON document with metadata and stream reports
    Json,
}

/// sb-loader - Load microscopy captures and stream every pixel plane.
///
/// Reads each capture of a document, prints its metadata and reads all
/// 16-bit planes of the selected positions. Exits non-zero if the document
/// cannot be opened or any plane fails to read.
#[derive(Parser, Debug, Clone)]
#[command(name = "sb-loader")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Capture manifest (JSON) to load.
    #[arg(value_name = "FILE", env = "SBL_FILE")]
    pub file: PathBuf,

    /// Position index to stream for every capture.
    #[arg(short, long, default_value_t = DEFAULT_POSITION, env = "SBL_POSITION")]
    pub position: u32,

    /// Stream every position instead of a single one.
    #[arg(long, default_value_t = false, conflicts_with = "position")]
    pub all_positions: bool,

    /// Stream at most this many timepoints per position.
    #[arg(long, env = "SBL_MAX_TIMEPOINTS")]
    pub max_timepoints: Option<u32>,

    /// Error kinds the reader masks instead of raising (comma-separated:
    /// eof, fail, bad, unimplemented, uncategorized).
    ///
    /// By default every failure is raised, so a failing metadata query ends
    /// the run and failing planes carry the reader's error message.
    #[arg(long, value_delimiter = ',', env = "SBL_MASK")]
    pub mask: Vec<ErrorKind>,

    /// Mask every error kind.
    #[arg(long, default_value_t = false)]
    pub mask_all: bool,

    /// Report format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, env = "SBL_FORMAT")]
    pub format: OutputFormat,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.file.as_os_str().is_empty() {
            return Err("A capture file is required".to_string());
        }

        if self.max_timepoints == Some(0) {
            return Err("max_timepoints must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Reader policy: raise everything except the masked kinds.
    pub fn error_policy(&self) -> ErrorPolicy {
        if self.mask_all {
            return ErrorPolicy::MASK_ALL;
        }
        self.mask
            .iter()
            .fold(ErrorPolicy::RAISE_ALL, |policy, kind| policy.with_masked(*kind))
    }

    pub fn load_options(&self) -> LoadOptions {
        let positions = if self.all_positions {
            PositionSelection::All
        } else {
            PositionSelection::Single(self.position)
        };
        LoadOptions {
            positions,
            max_timepoints: self.max_timepoints,
        }
    }

    /// Log filter for the tracing subscriber.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            VERBOSE_LOG_FILTER
        } else {
            DEFAULT_LOG_FILTER
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
