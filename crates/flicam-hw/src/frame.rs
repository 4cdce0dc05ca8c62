//! Frame geometry and per-frame metadata handed to the host.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

/// Geometry of the frames the camera currently delivers.
///
/// Recomputed on variant selection, ROI changes and pixel-format writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameBufferDescriptor {
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: u32,
    pub bit_depth: u32,
    pub byte_order: ByteOrder,
}

impl FrameBufferDescriptor {
    /// Descriptor used while no camera is selected.
    pub const EMPTY: Self = Self {
        width: 0,
        height: 0,
        bytes_per_pixel: 2,
        bit_depth: 16,
        byte_order: ByteOrder::LittleEndian,
    };

    /// Bytes needed to hold one frame.
    pub fn buffer_len(&self) -> usize {
        self.width as usize * self.height as usize * self.bytes_per_pixel as usize
    }
}

impl Default for FrameBufferDescriptor {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Metadata attached to every frame inserted into the host sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameMetadata {
    pub camera_label: String,
    pub roi_x: u32,
    pub roi_y: u32,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
}

impl FrameMetadata {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
