//! JSON manifest backed capture reader.
//!
//! A manifest describes every capture of a document in JSON and points each
//! capture at a raw pixel file. Pixel files hold unsigned 16-bit
//! little-endian samples ordered position → timepoint → channel → z → row →
//! column, with no header.
//!
//! ```text
//! {
//!   "captures": [{
//!     "image_name": "HeLa live", "capture_date": "2019-03-14 10:22",
//!     "lens_name": "63x oil", "magnification": 63.0,
//!     "columns": 512, "rows": 512, "planes": 12, "timepoints": 40,
//!     "voxel_size": [0.1, 0.1, 0.5],
//!     "channels": [{ "name": "GFP", "exposure_ms": 100 }],
//!     "elapsed_ms": [0, 30000, ...],
//!     "positions": [{ "x": 100.5, "y": -20.0, "montage_row": 0, "montage_column": 0 }],
//!     "pixels": "capture_0.raw"
//!   }]
//! }
//! ```

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ErrorCode, ReaderError};

use super::policy::{ErrorKind, ErrorPolicy, ReadState};
use super::{CaptureReader, StringField};

/// Size in bytes of one pixel sample.
pub const SAMPLE_SIZE: usize = std::mem::size_of::<u16>();

// =============================================================================
// Manifest Types
// =============================================================================

/// Top-level manifest document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub captures: Vec<CaptureEntry>,
}

/// One capture as described in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureEntry {
    pub image_name: String,
    pub comments: String,
    pub capture_date: String,
    pub lens_name: String,
    pub magnification: f32,

    /// Plane width in pixels
    pub columns: u32,

    /// Plane height in pixels
    pub rows: u32,

    /// Number of Z-planes
    pub planes: u32,

    pub timepoints: u32,

    /// Voxel size in microns; `null` when not calibrated
    pub voxel_size: Option<[f32; 3]>,

    pub channels: Vec<ChannelEntry>,

    /// Elapsed time per timepoint in milliseconds; empty means all zero
    pub elapsed_ms: Vec<u32>,

    /// Stage positions; empty means a single position at the origin
    pub positions: Vec<PositionEntry>,

    /// Raw pixel file, relative to the manifest
    pub pixels: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelEntry {
    pub name: String,
    pub exposure_ms: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionEntry {
    pub x: f32,
    pub y: f32,
    pub montage_row: u32,
    pub montage_column: u32,
}

impl CaptureEntry {
    fn samples_per_plane(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// Index of a plane in the pixel file, counted in planes.
    fn plane_index(&self, position: u32, timepoint: u32, z: u32, channel: u32) -> usize {
        let timepoints = self.timepoints as usize;
        let channels = self.channels.len();
        let planes = self.planes as usize;
        ((position as usize * timepoints + timepoint as usize) * channels + channel as usize)
            * planes
            + z as usize
    }
}

// =============================================================================
// ManifestReader
// =============================================================================

/// [`CaptureReader`] over a JSON manifest and raw pixel files.
#[derive(Debug)]
pub struct ManifestReader {
    manifest: Manifest,
    pixels: Vec<Option<Bytes>>,
    policy: ErrorPolicy,
    state: Cell<ReadState>,
    identifier: String,
}

impl ManifestReader {
    /// Build a reader from an in-memory manifest with no pixel data attached.
    pub fn new(mut manifest: Manifest, policy: ErrorPolicy) -> Result<Self, ReaderError> {
        for (index, capture) in manifest.captures.iter_mut().enumerate() {
            normalize_capture(index, capture)?;
        }

        let pixels = vec![None; manifest.captures.len()];
        Ok(Self {
            manifest,
            pixels,
            policy,
            state: Cell::new(ReadState::GOOD),
            identifier: "<memory>".to_string(),
        })
    }

    /// Open a manifest file and load every referenced pixel file.
    ///
    /// Open failures are always returned as errors regardless of policy,
    /// since there is no reader yet to record them on.
    pub fn open(path: impl AsRef<Path>, policy: ErrorPolicy) -> Result<Self, ReaderError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            ReaderError::new(
                ErrorKind::Fail,
                ErrorCode::UnableToOpen,
                format!("{}: {}", path.display(), e),
            )
        })?;
        let manifest: Manifest = serde_json::from_str(&text).map_err(|e| {
            ReaderError::new(
                ErrorKind::Bad,
                ErrorCode::InvalidSlideDocument,
                format!("{}: {}", path.display(), e),
            )
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let mut reader = Self::new(manifest, policy)?;
        reader.identifier = path.display().to_string();

        for index in 0..reader.manifest.captures.len() {
            let Some(relative) = reader.manifest.captures[index].pixels.clone() else {
                continue;
            };
            let pixel_path = base.join(relative);
            let data = fs::read(&pixel_path).map_err(|e| {
                ReaderError::new(
                    ErrorKind::Fail,
                    ErrorCode::UnableToOpen,
                    format!("{}: {}", pixel_path.display(), e),
                )
            })?;
            debug!(
                capture = index,
                bytes = data.len(),
                "loaded pixel file {}",
                pixel_path.display()
            );
            reader.pixels[index] = Some(Bytes::from(data));
        }

        debug!(
            captures = reader.manifest.captures.len(),
            "opened {}", reader.identifier
        );
        Ok(reader)
    }

    /// Attach raw little-endian pixel data to a capture.
    pub fn with_pixels(mut self, capture: usize, data: impl Into<Bytes>) -> Self {
        if let Some(slot) = self.pixels.get_mut(capture) {
            *slot = Some(data.into());
        }
        self
    }

    /// Identifier used in log messages (the manifest path when opened from disk).
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Record a failure and return it if the policy raises its kind.
    fn fail(&self, error: ReaderError) -> Result<(), ReaderError> {
        self.state.set(self.state.get().with(error.kind));
        if self.policy.raises(error.kind) {
            return Err(error);
        }
        debug!(kind = %error.kind, code = %error.code, "masked: {}", error.message);
        Ok(())
    }

    /// Resolve an indexed item, recording an invalid-index failure if absent.
    fn lookup<'a, T>(
        &self,
        item: Option<&'a T>,
        describe: impl FnOnce() -> String,
    ) -> Result<Option<&'a T>, ReaderError> {
        if item.is_none() {
            self.fail(ReaderError::invalid_index(describe()))?;
        }
        Ok(item)
    }

    fn capture(&self, capture: u32) -> Result<Option<&CaptureEntry>, ReaderError> {
        self.lookup(self.manifest.captures.get(capture as usize), || {
            format!(
                "capture {} out of range ({} captures)",
                capture,
                self.manifest.captures.len()
            )
        })
    }

    fn channel(&self, capture: u32, channel: u32) -> Result<Option<&ChannelEntry>, ReaderError> {
        let Some(entry) = self.capture(capture)? else {
            return Ok(None);
        };
        self.lookup(entry.channels.get(channel as usize), || {
            format!(
                "channel {} out of range for capture {} ({} channels)",
                channel,
                capture,
                entry.channels.len()
            )
        })
    }

    fn position(&self, capture: u32, position: u32) -> Result<Option<&PositionEntry>, ReaderError> {
        let Some(entry) = self.capture(capture)? else {
            return Ok(None);
        };
        self.lookup(entry.positions.get(position as usize), || {
            format!(
                "position {} out of range for capture {} ({} positions)",
                position,
                capture,
                entry.positions.len()
            )
        })
    }

    /// Check a scalar index against a count.
    fn check_index(&self, what: &str, index: u32, count: u32, capture: u32) -> Result<bool, ReaderError> {
        if index < count {
            return Ok(true);
        }
        self.fail(ReaderError::invalid_index(format!(
            "{} {} out of range for capture {} ({} available)",
            what, index, capture, count
        )))?;
        Ok(false)
    }
}

/// Fill in defaults and reject inconsistent capture descriptions.
fn normalize_capture(index: usize, capture: &mut CaptureEntry) -> Result<(), ReaderError> {
    if capture.positions.is_empty() {
        capture.positions.push(PositionEntry::default());
    }
    if capture.elapsed_ms.is_empty() {
        capture.elapsed_ms = vec![0; capture.timepoints as usize];
    }
    if capture.elapsed_ms.len() != capture.timepoints as usize {
        return Err(ReaderError::new(
            ErrorKind::Bad,
            ErrorCode::InvalidSlideDocument,
            format!(
                "capture {}: {} elapsed times for {} timepoints",
                index,
                capture.elapsed_ms.len(),
                capture.timepoints
            ),
        ));
    }
    Ok(())
}

/// Copy `value` plus a NUL terminator into `buf`, truncating to fit.
fn copy_terminated(value: &str, buf: &mut [u8]) {
    let bytes = value.as_bytes();
    let n = bytes.len().min(buf.len());
    buf[..n].copy_from_slice(&bytes[..n]);
    if n < buf.len() {
        buf[n] = 0;
    }
}

impl CaptureReader for ManifestReader {
    fn capture_count(&self) -> Result<u32, ReaderError> {
        Ok(self.manifest.captures.len() as u32)
    }

    fn position_count(&self, capture: u32) -> Result<u32, ReaderError> {
        Ok(self
            .capture(capture)?
            .map_or(0, |c| c.positions.len() as u32))
    }

    fn channel_count(&self, capture: u32) -> Result<u32, ReaderError> {
        Ok(self.capture(capture)?.map_or(0, |c| c.channels.len() as u32))
    }

    fn timepoint_count(&self, capture: u32) -> Result<u32, ReaderError> {
        Ok(self.capture(capture)?.map_or(0, |c| c.timepoints))
    }

    fn x_columns(&self, capture: u32) -> Result<u32, ReaderError> {
        Ok(self.capture(capture)?.map_or(0, |c| c.columns))
    }

    fn y_rows(&self, capture: u32) -> Result<u32, ReaderError> {
        Ok(self.capture(capture)?.map_or(0, |c| c.rows))
    }

    fn z_planes(&self, capture: u32) -> Result<u32, ReaderError> {
        Ok(self.capture(capture)?.map_or(0, |c| c.planes))
    }

    fn voxel_size(&self, capture: u32) -> Result<Option<[f32; 3]>, ReaderError> {
        Ok(self.capture(capture)?.and_then(|c| c.voxel_size))
    }

    fn exposure_time(&self, capture: u32, channel: u32) -> Result<u32, ReaderError> {
        Ok(self.channel(capture, channel)?.map_or(0, |c| c.exposure_ms))
    }

    fn elapsed_time(&self, capture: u32, timepoint: u32) -> Result<u32, ReaderError> {
        let Some(entry) = self.capture(capture)? else {
            return Ok(0);
        };
        Ok(self
            .lookup(entry.elapsed_ms.get(timepoint as usize), || {
                format!(
                    "timepoint {} out of range for capture {} ({} timepoints)",
                    timepoint, capture, entry.timepoints
                )
            })?
            .copied()
            .unwrap_or(0))
    }

    fn magnification(&self, capture: u32) -> Result<f32, ReaderError> {
        Ok(self.capture(capture)?.map_or(0.0, |c| c.magnification))
    }

    fn x_position(&self, capture: u32, position: u32) -> Result<f32, ReaderError> {
        Ok(self.position(capture, position)?.map_or(0.0, |p| p.x))
    }

    fn y_position(&self, capture: u32, position: u32) -> Result<f32, ReaderError> {
        Ok(self.position(capture, position)?.map_or(0.0, |p| p.y))
    }

    fn montage_row(&self, capture: u32, position: u32) -> Result<u32, ReaderError> {
        Ok(self.position(capture, position)?.map_or(0, |p| p.montage_row))
    }

    fn montage_column(&self, capture: u32, position: u32) -> Result<u32, ReaderError> {
        Ok(self
            .position(capture, position)?
            .map_or(0, |p| p.montage_column))
    }

    fn read_string(
        &self,
        capture: u32,
        field: StringField,
        buf: Option<&mut [u8]>,
    ) -> Result<u32, ReaderError> {
        let value = match field {
            StringField::ImageName => self.capture(capture)?.map(|c| c.image_name.as_str()),
            StringField::ImageComments => self.capture(capture)?.map(|c| c.comments.as_str()),
            StringField::CaptureDate => self.capture(capture)?.map(|c| c.capture_date.as_str()),
            StringField::LensName => self.capture(capture)?.map(|c| c.lens_name.as_str()),
            StringField::ChannelName(channel) => {
                self.channel(capture, channel)?.map(|c| c.name.as_str())
            }
        };

        let value = match value {
            Some(v) if !v.is_empty() => v,
            _ => return Ok(0),
        };

        if let Some(buf) = buf {
            copy_terminated(value, buf);
        }
        Ok(value.len() as u32 + 1)
    }

    fn read_plane(
        &self,
        out: &mut [u16],
        stride_bytes: usize,
        capture: u32,
        position: u32,
        timepoint: u32,
        z: u32,
        channel: u32,
    ) -> Result<bool, ReaderError> {
        let Some(entry) = self.capture(capture)? else {
            return Ok(false);
        };
        let in_range = self.check_index("position", position, entry.positions.len() as u32, capture)?
            && self.check_index("timepoint", timepoint, entry.timepoints, capture)?
            && self.check_index("channel", channel, entry.channels.len() as u32, capture)?
            && self.check_index("plane", z, entry.planes, capture)?;
        if !in_range {
            return Ok(false);
        }

        let columns = entry.columns as usize;
        let rows = entry.rows as usize;
        if stride_bytes < columns * SAMPLE_SIZE || stride_bytes % SAMPLE_SIZE != 0 {
            self.fail(ReaderError::new(
                ErrorKind::Fail,
                ErrorCode::Uncategorized,
                format!(
                    "stride of {} bytes invalid for {} columns",
                    stride_bytes, columns
                ),
            ))?;
            return Ok(false);
        }
        let stride = stride_bytes / SAMPLE_SIZE;
        let needed = if rows == 0 { 0 } else { (rows - 1) * stride + columns };
        if out.len() < needed {
            self.fail(ReaderError::new(
                ErrorKind::Fail,
                ErrorCode::Uncategorized,
                format!("output holds {} samples, plane needs {}", out.len(), needed),
            ))?;
            return Ok(false);
        }

        if columns == 0 || rows == 0 {
            return Ok(true);
        }

        let Some(data) = self.pixels.get(capture as usize).and_then(Option::as_ref) else {
            self.fail(ReaderError::new(
                ErrorKind::Fail,
                ErrorCode::InvalidSlideDocument,
                format!("capture {} has no pixel data", capture),
            ))?;
            return Ok(false);
        };

        let plane_bytes = entry.samples_per_plane() * SAMPLE_SIZE;
        let start = entry.plane_index(position, timepoint, z, channel) * plane_bytes;
        let end = start + plane_bytes;
        if end > data.len() {
            self.fail(ReaderError::new(
                ErrorKind::Eof,
                ErrorCode::None,
                format!(
                    "plane (t={}, c={}, z={}) at bytes {}..{} beyond pixel data of {} bytes",
                    timepoint,
                    channel,
                    z,
                    start,
                    end,
                    data.len()
                ),
            ))?;
            return Ok(false);
        }

        let plane = &data[start..end];
        for (row, src) in plane.chunks_exact(columns * SAMPLE_SIZE).enumerate() {
            let dst = &mut out[row * stride..row * stride + columns];
            for (sample, pair) in dst.iter_mut().zip(src.chunks_exact(SAMPLE_SIZE)) {
                *sample = u16::from_le_bytes([pair[0], pair[1]]);
            }
        }
        Ok(true)
    }

    fn state(&self) -> ReadState {
        self.state.get()
    }

    fn clear(&self) {
        self.state.set(ReadState::GOOD);
    }
}

// =============================================================================
// Tests
// =============================================================================
