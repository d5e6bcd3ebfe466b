//! Per-capture metadata snapshot.
//!
//! [`CaptureMetadata::load`] issues one reader query per field and keeps the
//! results. Values a reader produces under a masking policy (zero, empty) are
//! taken as they are; errors it raises are propagated.

use serde::Serialize;

use crate::error::ReaderError;
use crate::reader::{read_string_field, CaptureReader, StringField};

use super::index::IndexFormatter;

// =============================================================================
// Component Types
// =============================================================================

/// Physical size of one voxel in microns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoxelSize {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl VoxelSize {
    /// Placeholder used when a capture is not calibrated.
    pub const UNIT: VoxelSize = VoxelSize {
        x: 1.0,
        y: 1.0,
        z: 1.0,
    };
}

impl From<[f32; 3]> for VoxelSize {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

/// One acquisition channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    pub name: String,

    /// Exposure time in milliseconds
    pub exposure_ms: u32,
}

/// Stage location of one position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StagePosition {
    /// Stage X in microns
    pub x: f32,

    /// Stage Y in microns
    pub y: f32,

    pub montage_row: u32,
    pub montage_column: u32,
}

// =============================================================================
// CaptureMetadata
// =============================================================================

/// Immutable description of one capture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureMetadata {
    /// 0-based index of this capture
    pub capture_index: u32,

    /// Number of captures in the document
    pub capture_count: u32,

    pub position_count: u32,
    pub channel_count: u32,
    pub timepoint_count: u32,

    /// Plane width in pixels
    pub x_dim: u32,

    /// Plane height in pixels
    pub y_dim: u32,

    /// Number of Z-planes
    pub z_dim: u32,

    /// False when `voxel_size` is the [`VoxelSize::UNIT`] placeholder
    pub has_voxel_size: bool,
    pub voxel_size: VoxelSize,

    pub image_name: String,
    pub image_comments: String,
    pub capture_date: String,
    pub lens_name: String,
    pub magnification: f32,

    /// Channels in index order
    pub channels: Vec<Channel>,

    /// Elapsed milliseconds per timepoint
    pub elapsed_ms: Vec<u32>,

    /// Stage positions in index order
    pub positions: Vec<StagePosition>,
}

impl CaptureMetadata {
    /// Query every field of `capture_index` from `reader`.
    pub fn load<R: CaptureReader + ?Sized>(
        reader: &R,
        capture_index: u32,
    ) -> Result<Self, ReaderError> {
        let capture_count = reader.capture_count()?;
        let position_count = reader.position_count(capture_index)?;
        let channel_count = reader.channel_count(capture_index)?;
        let timepoint_count = reader.timepoint_count(capture_index)?;

        let (has_voxel_size, voxel_size) = match reader.voxel_size(capture_index)? {
            Some(size) => (true, VoxelSize::from(size)),
            None => (false, VoxelSize::UNIT),
        };

        let channels = (0..channel_count)
            .map(|c| {
                Ok(Channel {
                    name: read_string_field(reader, capture_index, StringField::ChannelName(c))?,
                    exposure_ms: reader.exposure_time(capture_index, c)?,
                })
            })
            .collect::<Result<Vec<_>, ReaderError>>()?;

        let elapsed_ms = (0..timepoint_count)
            .map(|t| reader.elapsed_time(capture_index, t))
            .collect::<Result<Vec<_>, ReaderError>>()?;

        let positions = (0..position_count)
            .map(|p| {
                Ok(StagePosition {
                    x: reader.x_position(capture_index, p)?,
                    y: reader.y_position(capture_index, p)?,
                    montage_row: reader.montage_row(capture_index, p)?,
                    montage_column: reader.montage_column(capture_index, p)?,
                })
            })
            .collect::<Result<Vec<_>, ReaderError>>()?;

        Ok(Self {
            capture_index,
            capture_count,
            position_count,
            channel_count,
            timepoint_count,
            x_dim: reader.x_columns(capture_index)?,
            y_dim: reader.y_rows(capture_index)?,
            z_dim: reader.z_planes(capture_index)?,
            has_voxel_size,
            voxel_size,
            image_name: read_string_field(reader, capture_index, StringField::ImageName)?,
            image_comments: read_string_field(reader, capture_index, StringField::ImageComments)?,
            capture_date: read_string_field(reader, capture_index, StringField::CaptureDate)?,
            lens_name: read_string_field(reader, capture_index, StringField::LensName)?,
            magnification: reader.magnification(capture_index)?,
            channels,
            elapsed_ms,
            positions,
        })
    }

    /// Samples in one 2D plane.
    pub fn samples_per_plane(&self) -> usize {
        self.x_dim as usize * self.y_dim as usize
    }

    /// Samples in one full Z-stack, or `None` if that overflows `usize`.
    pub fn samples_per_stack(&self) -> Option<usize> {
        (self.x_dim as usize)
            .checked_mul(self.y_dim as usize)?
            .checked_mul(self.z_dim as usize)
    }

    /// Number of planes in one position: timepoints × channels × Z.
    pub fn plane_count(&self) -> u64 {
        u64::from(self.timepoint_count) * u64::from(self.channel_count) * u64::from(self.z_dim)
    }

    /// Index formatters for human-readable labels of this capture.
    pub fn labels(&self) -> CaptureLabels {
        CaptureLabels::new(self)
    }

    /// One-line summary of the capture at a position.
    pub fn header(&self, position: u32) -> String {
        format!(
            "capture {} of {} : position {} of {}, time points: {}, channels: {}",
            u64::from(self.capture_index) + 1,
            self.capture_count,
            u64::from(position) + 1,
            self.position_count,
            self.timepoint_count,
            self.channel_count
        )
    }

    /// Multi-line description of image, optics and channels.
    pub fn detail(&self) -> String {
        let voxel_status = if self.has_voxel_size {
            ""
        } else {
            "undefined defaulting "
        };

        let mut lines = vec![
            format!("Image name: {}", self.image_name),
            format!("Image size: [{},{},{}]", self.x_dim, self.y_dim, self.z_dim),
            format!(
                "Voxel size: {}[{},{},{}]",
                voxel_status, self.voxel_size.x, self.voxel_size.y, self.voxel_size.z
            ),
            format!("Image comments: {}", self.image_comments),
            format!("Capture date: {}", self.capture_date),
            format!("Lens name: {}", self.lens_name),
        ];

        if let [channel] = self.channels.as_slice() {
            lines.push(format!("Channel name: {}", channel.name));
            lines.push(format!("Channel exposure time: {}ms", channel.exposure_ms));
        } else {
            let labels = IndexFormatter::one_based(self.channel_count);
            for (c, channel) in self.channels.iter().enumerate() {
                lines.push(format!(
                    "Channel {}\n   name: {}\n   exposure time: {}ms",
                    labels.format(c as u32),
                    channel.name,
                    channel.exposure_ms
                ));
            }
        }

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

// =============================================================================
// CaptureLabels
// =============================================================================

/// Zero-padded labels for every dimension of one capture.
///
/// Capture, position, channel and timepoint labels are 1-based. Elapsed time
/// labels are milliseconds padded to the width of the last timepoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureLabels {
    pub capture: IndexFormatter,
    pub position: IndexFormatter,
    pub channel: IndexFormatter,
    pub timepoint: IndexFormatter,
    pub elapsed: IndexFormatter,
}

impl CaptureLabels {
    pub fn new(metadata: &CaptureMetadata) -> Self {
        let last_elapsed = metadata.elapsed_ms.last().copied().unwrap_or(0);
        Self {
            capture: IndexFormatter::one_based(metadata.capture_count),
            position: IndexFormatter::one_based(metadata.position_count),
            channel: IndexFormatter::one_based(metadata.channel_count),
            timepoint: IndexFormatter::one_based(metadata.timepoint_count),
            elapsed: IndexFormatter::new(last_elapsed, 0),
        }
    }

    /// Label for a plane, e.g. `C01_P1_T003_Ch2`.
    pub fn plane_label(&self, capture: u32, position: u32, timepoint: u32, channel: u32) -> String {
        format!(
            "C{}_P{}_T{}_Ch{}",
            self.capture.format(capture),
            self.position.format(position),
            self.timepoint.format(timepoint),
            self.channel.format(channel)
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
