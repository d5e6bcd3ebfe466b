//! Capture loader: walks a whole document.
//!
//! For every capture the loader builds [`CaptureMetadata`], allocates one
//! capture-sized [`PlaneBuffer`] and streams every selected position into
//! it. The buffer is dropped once the capture's last plane read returns.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       CaptureLoader                         │
//! │  for each capture:                                          │
//! │    1. CaptureMetadata::load      (raised errors abort run)  │
//! │    2. PlaneBuffer::allocate      (failure skips capture)    │
//! │    3. PlaneStreamer per position (plane failures recorded)  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::ops::ControlFlow;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::capture::{CaptureMetadata, PlaneBuffer, PlaneStreamer, StreamReport};
use crate::error::{LoadError, StreamError};
use crate::reader::CaptureReader;

// =============================================================================
// Options
// =============================================================================

/// Which positions of each capture to stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSelection {
    /// One position, the same index for every capture
    Single(u32),

    /// Every position of every capture
    All,
}

impl Default for PositionSelection {
    fn default() -> Self {
        PositionSelection::Single(0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub positions: PositionSelection,

    /// Stream at most this many timepoints per position
    pub max_timepoints: Option<u32>,
}

// =============================================================================
// Events and Summaries
// =============================================================================

/// Progress notifications passed to the loader's visitor.
#[derive(Debug, Clone, Copy)]
pub enum LoadEvent<'a> {
    /// Metadata of a capture is ready; streaming has not started
    Capture(&'a CaptureMetadata),

    /// A position of the capture is about to be streamed
    Position {
        metadata: &'a CaptureMetadata,
        position: u32,
    },

    /// A Z-stack has been read into the buffer
    Stack {
        metadata: &'a CaptureMetadata,
        position: u32,
        timepoint: u32,
        channel: u32,
        samples: &'a [u16],
    },
}

/// Result of loading one capture.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureSummary {
    pub metadata: CaptureMetadata,

    /// One report per streamed position
    pub streams: Vec<StreamReport>,

    /// Set when streaming of this capture was aborted
    #[serde(serialize_with = "serialize_stream_error")]
    pub error: Option<StreamError>,
}

fn serialize_stream_error<S: serde::Serializer>(
    error: &Option<StreamError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

impl CaptureSummary {
    pub fn failed_planes(&self) -> usize {
        self.streams.iter().map(|s| s.failures.len()).sum()
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.streams.iter().all(StreamReport::is_success)
    }
}

/// Result of loading a document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadSummary {
    pub captures: Vec<CaptureSummary>,

    /// True if the visitor stopped the run early
    pub cancelled: bool,
}

impl LoadSummary {
    pub fn planes_requested(&self) -> u64 {
        self.captures
            .iter()
            .flat_map(|c| c.streams.iter())
            .map(|s| s.requested)
            .sum()
    }

    pub fn failed_planes(&self) -> usize {
        self.captures.iter().map(CaptureSummary::failed_planes).sum()
    }

    pub fn is_success(&self) -> bool {
        !self.cancelled && self.captures.iter().all(CaptureSummary::is_success)
    }
}

// =============================================================================
// CaptureLoader
// =============================================================================

/// Drives metadata assembly and plane streaming over every capture.
pub struct CaptureLoader<'r, R: CaptureReader + ?Sized> {
    reader: &'r R,
    options: LoadOptions,
}

impl<'r, R: CaptureReader + ?Sized> CaptureLoader<'r, R> {
    pub fn new(reader: &'r R, options: LoadOptions) -> Self {
        Self { reader, options }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Load every capture with no visitor.
    pub fn run(&self) -> Result<LoadSummary, LoadError> {
        self.run_with(|_| ControlFlow::Continue(()))
    }

    /// Load every capture, reporting progress to `visit`.
    ///
    /// Returning [`ControlFlow::Break`] from `visit` stops the run before
    /// the next plane, position or capture. A capture whose buffer cannot be allocated is recorded and
    /// skipped; a reader error raised while building metadata ends the run.
    pub fn run_with<F>(&self, mut visit: F) -> Result<LoadSummary, LoadError>
    where
        F: FnMut(LoadEvent<'_>) -> ControlFlow<()>,
    {
        let capture_count = self.reader.capture_count()?;
        info!(captures = capture_count, "loading document");

        let mut summary = LoadSummary::default();
        for capture in 0..capture_count {
            let metadata = CaptureMetadata::load(self.reader, capture)?;
            if visit(LoadEvent::Capture(&metadata)).is_break() {
                summary.cancelled = true;
                break;
            }

            let (capture_summary, cancelled) = self.stream_capture(metadata, &mut visit);
            summary.captures.push(capture_summary);
            if cancelled {
                summary.cancelled = true;
                break;
            }
        }

        info!(
            captures = summary.captures.len(),
            planes = summary.planes_requested(),
            failed = summary.failed_planes(),
            "document loaded"
        );
        Ok(summary)
    }

    /// Load and stream a single capture.
    pub fn load_capture(&self, capture: u32) -> Result<CaptureSummary, LoadError> {
        let metadata = CaptureMetadata::load(self.reader, capture)?;
        let mut ignore = |_: LoadEvent<'_>| ControlFlow::Continue(());
        let (mut summary, _) = self.stream_capture(metadata, &mut ignore);
        if let Some(e) = summary.error.take() {
            return Err(LoadError::Stream(e));
        }
        Ok(summary)
    }

    fn positions(&self, metadata: &CaptureMetadata) -> Vec<u32> {
        match self.options.positions {
            PositionSelection::Single(p) => vec![p],
            PositionSelection::All => (0..metadata.position_count).collect(),
        }
    }

    /// Stream the selected positions of one capture. Returns the summary and
    /// whether the visitor cancelled.
    fn stream_capture<F>(&self, metadata: CaptureMetadata, visit: &mut F) -> (CaptureSummary, bool)
    where
        F: FnMut(LoadEvent<'_>) -> ControlFlow<()>,
    {
        let mut summary = CaptureSummary {
            metadata,
            streams: Vec::new(),
            error: None,
        };
        let metadata = &summary.metadata;

        let mut buffer = match PlaneBuffer::allocate(metadata) {
            Ok(buffer) => buffer,
            Err(e) => {
                error!(capture = metadata.capture_index, "{}", e);
                summary.error = Some(e);
                return (summary, false);
            }
        };
        debug!(
            capture = metadata.capture_index,
            samples = buffer.len(),
            "allocated plane buffer"
        );

        let mut streams = Vec::new();
        let mut error = None;
        let mut cancelled = false;
        for position in self.positions(metadata) {
            let streamer = match PlaneStreamer::new(metadata, position) {
                Ok(s) => s,
                Err(e) => {
                    error!(capture = metadata.capture_index, "{}", e);
                    error = Some(e);
                    break;
                }
            };
            let streamer = match self.options.max_timepoints {
                Some(max) => streamer.limit_timepoints(max),
                None => streamer,
            };

            if visit(LoadEvent::Position { metadata, position }).is_break() {
                cancelled = true;
                break;
            }

            info!(
                capture = metadata.capture_index,
                position,
                planes = streamer.plane_count(),
                "streaming position"
            );
            let result = streamer.stream(self.reader, &mut buffer, |timepoint, channel, samples| {
                visit(LoadEvent::Stack {
                    metadata,
                    position,
                    timepoint,
                    channel,
                    samples,
                })
            });
            match result {
                Ok(report) => {
                    cancelled = report.cancelled;
                    streams.push(report);
                }
                Err(e) => {
                    error!(capture = metadata.capture_index, "{}", e);
                    error = Some(e);
                    break;
                }
            }
            if cancelled {
                break;
            }
        }

        summary.streams = streams;
        summary.error = error;
        (summary, cancelled)
    }
}

// =============================================================================
// Tests
// =============================================================================
