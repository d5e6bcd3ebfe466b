//! Recording reader used by unit tests.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::{ErrorCode, ReaderError};

use super::{CaptureReader, ErrorKind, ReadState, StringField};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PlaneCall {
    pub position: u32,
    pub timepoint: u32,
    pub channel: u32,
    pub z: u32,
    pub len: usize,
    pub stride_bytes: usize,
}

/// Single-capture reader that records every string and plane request.
///
/// Each plane read fills the output with `t * 100 + c * 10 + z`.
#[derive(Debug, Default)]
pub(crate) struct MockReader {
    pub positions: u32,
    pub channels: u32,
    pub timepoints: u32,
    pub columns: u32,
    pub rows: u32,
    pub planes: u32,
    pub voxel: Option<[f32; 3]>,
    pub strings: HashMap<StringField, String>,
    pub exposures: Vec<u32>,
    pub elapsed: Vec<u32>,
    /// `(t, c, z)` triples whose read fails
    pub failing: Vec<(u32, u32, u32)>,
    /// Report failures as `Err` rather than `Ok(false)`
    pub raise: bool,
    pub string_calls: RefCell<Vec<(StringField, bool)>>,
    pub plane_calls: RefCell<Vec<PlaneCall>>,
}

impl MockReader {
    pub fn new(timepoints: u32, channels: u32, planes: u32, columns: u32, rows: u32) -> Self {
        Self {
            positions: 1,
            channels,
            timepoints,
            columns,
            rows,
            planes,
            ..Default::default()
        }
    }

    pub fn with_string(mut self, field: StringField, value: &str) -> Self {
        self.strings.insert(field, value.to_string());
        self
    }

    pub fn plane_value(t: u32, c: u32, z: u32) -> u16 {
        (t * 100 + c * 10 + z) as u16
    }
}

impl CaptureReader for MockReader {
    fn capture_count(&self) -> Result<u32, ReaderError> {
        Ok(1)
    }

    fn position_count(&self, _capture: u32) -> Result<u32, ReaderError> {
        Ok(self.positions)
    }

    fn channel_count(&self, _capture: u32) -> Result<u32, ReaderError> {
        Ok(self.channels)
    }

    fn timepoint_count(&self, _capture: u32) -> Result<u32, ReaderError> {
        Ok(self.timepoints)
    }

    fn x_columns(&self, _capture: u32) -> Result<u32, ReaderError> {
        Ok(self.columns)
    }

    fn y_rows(&self, _capture: u32) -> Result<u32, ReaderError> {
        Ok(self.rows)
    }

    fn z_planes(&self, _capture: u32) -> Result<u32, ReaderError> {
        Ok(self.planes)
    }

    fn voxel_size(&self, _capture: u32) -> Result<Option<[f32; 3]>, ReaderError> {
        Ok(self.voxel)
    }

    fn exposure_time(&self, _capture: u32, channel: u32) -> Result<u32, ReaderError> {
        Ok(self.exposures.get(channel as usize).copied().unwrap_or(0))
    }

    fn elapsed_time(&self, _capture: u32, timepoint: u32) -> Result<u32, ReaderError> {
        Ok(self.elapsed.get(timepoint as usize).copied().unwrap_or(0))
    }

    fn magnification(&self, _capture: u32) -> Result<f32, ReaderError> {
        Ok(0.0)
    }

    fn x_position(&self, _capture: u32, position: u32) -> Result<f32, ReaderError> {
        Ok(position as f32 * 10.0)
    }

    fn y_position(&self, _capture: u32, _position: u32) -> Result<f32, ReaderError> {
        Ok(0.0)
    }

    fn montage_row(&self, _capture: u32, _position: u32) -> Result<u32, ReaderError> {
        Ok(0)
    }

    fn montage_column(&self, _capture: u32, position: u32) -> Result<u32, ReaderError> {
        Ok(position)
    }

    fn read_string(
        &self,
        _capture: u32,
        field: StringField,
        buf: Option<&mut [u8]>,
    ) -> Result<u32, ReaderError> {
        self.string_calls.borrow_mut().push((field, buf.is_some()));
        let Some(value) = self.strings.get(&field) else {
            return Ok(0);
        };
        if let Some(buf) = buf {
            let n = value.len().min(buf.len());
            buf[..n].copy_from_slice(&value.as_bytes()[..n]);
            if n < buf.len() {
                buf[n] = 0;
            }
        }
        Ok(value.len() as u32 + 1)
    }

    fn read_plane(
        &self,
        out: &mut [u16],
        stride_bytes: usize,
        _capture: u32,
        position: u32,
        timepoint: u32,
        z: u32,
        channel: u32,
    ) -> Result<bool, ReaderError> {
        self.plane_calls.borrow_mut().push(PlaneCall {
            position,
            timepoint,
            channel,
            z,
            len: out.len(),
            stride_bytes,
        });

        if self.failing.contains(&(timepoint, channel, z)) {
            if self.raise {
                return Err(ReaderError::new(
                    ErrorKind::Fail,
                    ErrorCode::None,
                    format!("plane ({}, {}, {}) unreadable", timepoint, channel, z),
                ));
            }
            return Ok(false);
        }

        out.fill(Self::plane_value(timepoint, channel, z));
        Ok(true)
    }

    fn state(&self) -> ReadState {
        ReadState::GOOD
    }

    fn clear(&self) {}
}
