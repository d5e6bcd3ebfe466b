//! Capture metadata, labels and plane streaming.
//!
//! # Components
//!
//! - [`CaptureMetadata`]: immutable snapshot of one capture's dimensions,
//!   optics, channels and positions
//! - [`CaptureLabels`] / [`IndexFormatter`]: fixed-width labels for indices
//! - [`PlaneStreamer`]: walks every `(timepoint, channel, z)` plane of a
//!   capture position into a [`PlaneBuffer`]
//! - [`StreamReport`]: what was read and which planes failed

mod index;
mod metadata;
mod streamer;

pub use index::IndexFormatter;
pub use metadata::{CaptureLabels, CaptureMetadata, Channel, StagePosition, VoxelSize};
pub use streamer::{
    PlaneBuffer, PlaneCoord, PlaneCursor, PlaneFailure, PlaneStreamer, StreamReport,
};
