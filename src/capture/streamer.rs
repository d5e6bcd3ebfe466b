//! Plane streaming for one capture position.
//!
//! The streamer walks every `(timepoint, channel, z)` triple of a capture
//! position exactly once, timepoint outermost and Z innermost, and asks the
//! reader for each plane. Planes of one `(timepoint, channel)` pair form a
//! Z-stack that fills the caller's buffer:
//!
//! ```text
//! buffer: ┌──────────┬──────────┬─────┬──────────────┐
//!         │  z = 0   │  z = 1   │ ... │  z = Z - 1   │
//!         └──────────┴──────────┴─────┴──────────────┘
//!         0          X*Y        2*X*Y             Z*X*Y samples
//! ```
//!
//! A failed plane read is recorded in the [`StreamReport`] and the walk goes
//! on, since the rest of the buffer is still useful.

use std::ops::{ControlFlow, Deref, DerefMut};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ReaderError, StreamError};
use crate::reader::{CaptureReader, SAMPLE_SIZE};

use super::metadata::CaptureMetadata;

// =============================================================================
// Plane Coordinates
// =============================================================================

/// Address of one plane within a capture position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PlaneCoord {
    pub timepoint: u32,
    pub channel: u32,
    pub z: u32,
}

impl PlaneCoord {
    pub fn new(timepoint: u32, channel: u32, z: u32) -> Self {
        Self {
            timepoint,
            channel,
            z,
        }
    }
}

/// Traversal cursor over every `(timepoint, channel, z)` triple.
///
/// Yields `timepoints * channels * planes` coordinates, timepoint outermost.
#[derive(Debug, Clone)]
pub struct PlaneCursor {
    timepoints: u32,
    channels: u32,
    planes: u32,
    next: Option<PlaneCoord>,
}

impl PlaneCursor {
    pub fn new(timepoints: u32, channels: u32, planes: u32) -> Self {
        let next = (timepoints > 0 && channels > 0 && planes > 0).then(|| PlaneCoord::new(0, 0, 0));
        Self {
            timepoints,
            channels,
            planes,
            next,
        }
    }

    fn advance(&self, coord: PlaneCoord) -> Option<PlaneCoord> {
        if coord.z + 1 < self.planes {
            return Some(PlaneCoord::new(coord.timepoint, coord.channel, coord.z + 1));
        }
        if coord.channel + 1 < self.channels {
            return Some(PlaneCoord::new(coord.timepoint, coord.channel + 1, 0));
        }
        if coord.timepoint + 1 < self.timepoints {
            return Some(PlaneCoord::new(coord.timepoint + 1, 0, 0));
        }
        None
    }
}

impl Iterator for PlaneCursor {
    type Item = PlaneCoord;

    fn next(&mut self) -> Option<PlaneCoord> {
        let current = self.next?;
        self.next = self.advance(current);
        Some(current)
    }
}

// =============================================================================
// Plane Buffer
// =============================================================================

/// Caller-owned storage for one Z-stack of 16-bit samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaneBuffer {
    samples: Vec<u16>,
}

impl PlaneBuffer {
    /// Allocate a zeroed buffer sized for one Z-stack of `metadata`.
    pub fn allocate(metadata: &CaptureMetadata) -> Result<Self, StreamError> {
        let samples = metadata
            .samples_per_stack()
            .ok_or(StreamError::Allocation { samples: usize::MAX })?;
        Self::with_samples(samples)
    }

    /// Allocate a zeroed buffer of exactly `samples` samples.
    pub fn with_samples(samples: usize) -> Result<Self, StreamError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(samples)
            .map_err(|_| StreamError::Allocation { samples })?;
        buf.resize(samples, 0);
        Ok(Self { samples: buf })
    }

    /// Samples of plane `z` for planes of `samples_per_plane` samples.
    pub fn plane(&self, z: u32, samples_per_plane: usize) -> Option<&[u16]> {
        let start = (z as usize).checked_mul(samples_per_plane)?;
        self.samples.get(start..start.checked_add(samples_per_plane)?)
    }

    pub fn into_inner(self) -> Vec<u16> {
        self.samples
    }
}

impl Deref for PlaneBuffer {
    type Target = [u16];

    fn deref(&self) -> &[u16] {
        &self.samples
    }
}

impl DerefMut for PlaneBuffer {
    fn deref_mut(&mut self) -> &mut [u16] {
        &mut self.samples
    }
}

// =============================================================================
// Stream Report
// =============================================================================

/// One plane that could not be read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaneFailure {
    pub coord: PlaneCoord,

    /// Error raised by the reader, or `None` if it reported failure by value
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<ReaderError>,
}

fn serialize_error<S: serde::Serializer>(
    error: &Option<ReaderError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Outcome of streaming one capture position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamReport {
    pub capture: u32,
    pub position: u32,

    /// Plane reads issued
    pub requested: u64,

    /// Planes whose read failed, in traversal order
    pub failures: Vec<PlaneFailure>,

    /// False if the stack visitor stopped the traversal early
    pub completed: bool,

    /// True if the stack visitor asked to stop, even after the last stack
    pub cancelled: bool,
}

impl StreamReport {
    /// True if every plane was requested and read.
    pub fn is_success(&self) -> bool {
        self.completed && self.failures.is_empty()
    }

    pub fn failed_coords(&self) -> impl Iterator<Item = PlaneCoord> + '_ {
        self.failures.iter().map(|f| f.coord)
    }
}

// =============================================================================
// PlaneStreamer
// =============================================================================

/// Streams every plane of one capture position into a caller buffer.
///
/// # Example
///
/// ```ignore
/// let metadata = CaptureMetadata::load(&reader, 0)?;
/// let mut buffer = PlaneBuffer::allocate(&metadata)?;
/// let streamer = PlaneStreamer::new(&metadata, 0)?;
///
/// let report = streamer.stream(&reader, &mut buffer, |t, c, stack| {
///     println!("stack t={} c={} holds {} samples", t, c, stack.len());
///     ControlFlow::Continue(())
/// })?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PlaneStreamer<'a> {
    metadata: &'a CaptureMetadata,
    position: u32,
    timepoints: u32,
}

impl<'a> PlaneStreamer<'a> {
    /// Create a streamer for `position` of the capture.
    pub fn new(metadata: &'a CaptureMetadata, position: u32) -> Result<Self, StreamError> {
        if position >= metadata.position_count {
            return Err(StreamError::InvalidPosition {
                capture: metadata.capture_index,
                position,
                count: metadata.position_count,
            });
        }
        Ok(Self {
            metadata,
            position,
            timepoints: metadata.timepoint_count,
        })
    }

    /// Only visit the first `max` timepoints.
    pub fn limit_timepoints(mut self, max: u32) -> Self {
        self.timepoints = self.timepoints.min(max);
        self
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    /// Number of plane reads a full traversal issues.
    pub fn plane_count(&self) -> u64 {
        u64::from(self.timepoints)
            * u64::from(self.metadata.channel_count)
            * u64::from(self.metadata.z_dim)
    }

    /// Cursor over the triples this streamer visits.
    pub fn cursor(&self) -> PlaneCursor {
        PlaneCursor::new(
            self.timepoints,
            self.metadata.channel_count,
            self.metadata.z_dim,
        )
    }

    /// Read every plane, calling `on_stack` after each completed Z-stack.
    ///
    /// `on_stack` receives the timepoint, the channel and the filled stack.
    /// Returning [`ControlFlow::Break`] stops the traversal before the next
    /// plane; the report then has `cancelled` set, and `completed == false`
    /// unless the stop came after the last stack.
    pub fn stream<R, F>(
        &self,
        reader: &R,
        buffer: &mut [u16],
        mut on_stack: F,
    ) -> Result<StreamReport, StreamError>
    where
        R: CaptureReader + ?Sized,
        F: FnMut(u32, u32, &[u16]) -> ControlFlow<()>,
    {
        let meta = self.metadata;
        let stack_len = meta
            .samples_per_stack()
            .ok_or(StreamError::Allocation { samples: usize::MAX })?;
        if buffer.len() < stack_len {
            return Err(StreamError::BufferTooSmall {
                required: stack_len,
                actual: buffer.len(),
            });
        }

        let plane_len = meta.samples_per_plane();
        let stride_bytes = meta.x_dim as usize * SAMPLE_SIZE;
        let last_z = meta.z_dim.saturating_sub(1);

        let mut report = StreamReport {
            capture: meta.capture_index,
            position: self.position,
            requested: 0,
            failures: Vec::new(),
            completed: true,
            cancelled: false,
        };

        for coord in self.cursor() {
            let offset = coord.z as usize * plane_len;
            let plane = &mut buffer[offset..offset + plane_len];

            report.requested += 1;
            let outcome = reader.read_plane(
                plane,
                stride_bytes,
                meta.capture_index,
                self.position,
                coord.timepoint,
                coord.z,
                coord.channel,
            );
            match outcome {
                Ok(true) => {}
                Ok(false) => {
                    warn!(
                        capture = meta.capture_index,
                        position = self.position,
                        timepoint = coord.timepoint,
                        channel = coord.channel,
                        z = coord.z,
                        "plane read failed"
                    );
                    report.failures.push(PlaneFailure { coord, error: None });
                }
                Err(e) => {
                    warn!(
                        capture = meta.capture_index,
                        position = self.position,
                        timepoint = coord.timepoint,
                        channel = coord.channel,
                        z = coord.z,
                        "plane read failed: {}",
                        e
                    );
                    report.failures.push(PlaneFailure {
                        coord,
                        error: Some(e),
                    });
                }
            }

            if coord.z == last_z {
                debug!(
                    capture = meta.capture_index,
                    timepoint = coord.timepoint,
                    channel = coord.channel,
                    "read stack"
                );
                if on_stack(coord.timepoint, coord.channel, &buffer[..stack_len]).is_break() {
                    report.completed = report.requested == self.plane_count();
                    report.cancelled = true;
                    break;
                }
            }
        }

        Ok(report)
    }

    /// Read every plane without inspecting the stacks.
    pub fn stream_all<R>(&self, reader: &R, buffer: &mut [u16]) -> Result<StreamReport, StreamError>
    where
        R: CaptureReader + ?Sized,
    {
        self.stream(reader, buffer, |_, _, _| ControlFlow::Continue(()))
    }
}

// =============================================================================
// Tests
// =============================================================================
