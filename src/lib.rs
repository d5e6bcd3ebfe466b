//! # Slidebook Loader
//!
//! Loads multi-dimensional microscopy captures through a [`CaptureReader`]
//! and streams every 16-bit pixel plane into memory.
//!
//! A document holds one or more captures. Each capture has positions,
//! timepoints, channels and Z planes of `x_dim * y_dim` samples. The loader
//! assembles a [`CaptureMetadata`] snapshot per capture, prints or reports
//! it, then reads every `(timepoint, channel, z)` plane of the selected
//! positions into a capture-sized buffer.
//!
//! ## Architecture
//!
//! - [`reader`] - The reader seam, error policy and a manifest-backed reader
//! - [`capture`] - Metadata snapshot, index labels and the plane streamer
//! - [`loader`] - Walks every capture of a document
//! - [`config`] - CLI and configuration types
//! - [`error`] - Error types
//!
//! ## Example
//!
//! ```rust,no_run
//! use sb_loader::{CaptureLoader, ErrorPolicy, LoadOptions, ManifestReader};
//!
//! let reader = ManifestReader::open("captures.json", ErrorPolicy::RAISE_ALL)?;
//! let summary = CaptureLoader::new(&reader, LoadOptions::default()).run()?;
//! println!("{} planes, {} failed", summary.planes_requested(), summary.failed_planes());
//! # Ok::<(), sb_loader::LoadError>(())
//! ```

pub mod capture;
pub mod config;
pub mod error;
pub mod loader;
pub mod reader;

pub use capture::{
    CaptureLabels, CaptureMetadata, Channel, IndexFormatter, PlaneBuffer, PlaneCoord, PlaneCursor,
    PlaneFailure, PlaneStreamer, StagePosition, StreamReport, VoxelSize,
};
pub use config::{Config, OutputFormat};
pub use error::{ErrorCode, LoadError, ReaderError, StreamError};
pub use loader::{
    CaptureLoader, CaptureSummary, LoadEvent, LoadOptions, LoadSummary, PositionSelection,
};
pub use reader::{
    read_string_field, CaptureEntry, CaptureReader, ChannelEntry, ErrorKind, ErrorPolicy,
    Manifest, ManifestReader, PositionEntry, ReadState, StringField, SAMPLE_SIZE,
};
