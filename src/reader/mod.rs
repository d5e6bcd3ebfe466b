//! Reader abstraction for capture documents.
//!
//! The [`CaptureReader`] trait is the whole surface the loader needs from an
//! already-open capture document. Everything above it (metadata assembly,
//! plane streaming, the CLI driver) works against the trait only.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             CaptureLoader               │
//! └────────────────────┬────────────────────┘
//!                      │
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │ CaptureMetadata │    │    PlaneStreamer    │
//! └────────┬────────┘    └──────────┬──────────┘
//!          └───────────┬────────────┘
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          CaptureReader Trait            │
//! │  (scalar, two-phase string, plane I/O)  │
//! └────────────────────┬────────────────────┘
//!                      ▼
//!            ┌─────────────────────┐
//!            │   ManifestReader    │
//!            │ (JSON + raw planes) │
//!            └─────────────────────┘
//! ```
//!
//! # Error handling
//!
//! Every query returns `Result`. Whether a failure shows up as `Err` or as a
//! zero/empty/`false` value plus an updated [`ReadState`] is governed by the
//! [`ErrorPolicy`] the reader was built with.

mod manifest;
#[cfg(test)]
pub(crate) mod mock;
mod policy;

pub use manifest::{
    CaptureEntry, ChannelEntry, Manifest, ManifestReader, PositionEntry, SAMPLE_SIZE,
};
pub use policy::{ErrorKind, ErrorPolicy, ReadState};

use crate::error::ReaderError;

// =============================================================================
// String Fields
// =============================================================================

/// Selector for the variable-length string fields of a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringField {
    ImageName,
    ImageComments,
    CaptureDate,
    LensName,
    /// Name of the channel with the given index
    ChannelName(u32),
}

// =============================================================================
// CaptureReader Trait
// =============================================================================

/// Query interface of an open capture document.
///
/// All indices are 0-based. Implementations are single-caller resources and
/// take `&self` even for queries that update their internal error state.
pub trait CaptureReader {
    /// Number of captures in the document.
    fn capture_count(&self) -> Result<u32, ReaderError>;

    fn position_count(&self, capture: u32) -> Result<u32, ReaderError>;

    fn channel_count(&self, capture: u32) -> Result<u32, ReaderError>;

    fn timepoint_count(&self, capture: u32) -> Result<u32, ReaderError>;

    /// Plane width in pixels.
    fn x_columns(&self, capture: u32) -> Result<u32, ReaderError>;

    /// Plane height in pixels.
    fn y_rows(&self, capture: u32) -> Result<u32, ReaderError>;

    /// Number of Z-planes.
    fn z_planes(&self, capture: u32) -> Result<u32, ReaderError>;

    /// Voxel size `[x, y, z]` in microns, or `None` when the document does
    /// not define one.
    fn voxel_size(&self, capture: u32) -> Result<Option<[f32; 3]>, ReaderError>;

    /// Exposure time of a channel in milliseconds.
    fn exposure_time(&self, capture: u32, channel: u32) -> Result<u32, ReaderError>;

    /// Milliseconds elapsed since the start of the capture at a timepoint.
    fn elapsed_time(&self, capture: u32, timepoint: u32) -> Result<u32, ReaderError>;

    /// Effective objective magnification.
    fn magnification(&self, capture: u32) -> Result<f32, ReaderError>;

    /// Stage X location of a position in microns.
    fn x_position(&self, capture: u32, position: u32) -> Result<f32, ReaderError>;

    /// Stage Y location of a position in microns.
    fn y_position(&self, capture: u32, position: u32) -> Result<f32, ReaderError>;

    fn montage_row(&self, capture: u32, position: u32) -> Result<u32, ReaderError>;

    fn montage_column(&self, capture: u32, position: u32) -> Result<u32, ReaderError>;

    /// Two-phase string query.
    ///
    /// With `buf == None` returns the byte length needed to hold the value,
    /// including a NUL terminator. With a buffer, fills it (truncating if it
    /// is short) and returns the same length. A return of 0 means the value
    /// is absent or the query failed.
    fn read_string(
        &self,
        capture: u32,
        field: StringField,
        buf: Option<&mut [u8]>,
    ) -> Result<u32, ReaderError>;

    /// Read one 2D plane into `out`, whose rows are `stride_bytes` apart.
    ///
    /// Returns `Ok(true)` if the whole plane was written and `Ok(false)` if
    /// any of it could not be read under a masking policy.
    #[allow(clippy::too_many_arguments)]
    fn read_plane(
        &self,
        out: &mut [u16],
        stride_bytes: usize,
        capture: u32,
        position: u32,
        timepoint: u32,
        z: u32,
        channel: u32,
    ) -> Result<bool, ReaderError>;

    /// Failures recorded since the last [`clear`](Self::clear).
    fn state(&self) -> ReadState;

    /// Reset the recorded state to [`ReadState::GOOD`].
    fn clear(&self);
}

/// Fetch a string field using the two-phase length-then-fill protocol.
///
/// Returns an empty string without allocating when the reader reports a
/// length of 0. Bytes after the first NUL are dropped and invalid UTF-8 is
/// replaced.
pub fn read_string_field<R: CaptureReader + ?Sized>(
    reader: &R,
    capture: u32,
    field: StringField,
) -> Result<String, ReaderError> {
    let len = reader.read_string(capture, field, None)?;
    if len == 0 {
        return Ok(String::new());
    }

    let mut buf = vec![0u8; len as usize];
    reader.read_string(capture, field, Some(&mut buf))?;

    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
}

// =============================================================================
// Tests
// =============================================================================
