//! Raw decoded frames exchanged between the frame source and the detector.

use serde::{Deserialize, Serialize};

/// One decoded frame in packed RGB24 layout (3 bytes per pixel, row-major).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFrame {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel data, `width * height * 3` bytes
    pub data: Vec<u8>,
}

impl RawFrame {
    /// Create a frame from raw RGB24 bytes.
    pub fn rgb24(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// Expected byte length for the frame dimensions.
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }

    /// Whether the buffer length matches the dimensions.
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == Self::expected_len(self.width, self.height)
    }
}
