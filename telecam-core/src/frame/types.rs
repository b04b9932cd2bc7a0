//! Shared frame types for the receive/display pipeline.
//!
//! Raw frames are RGB565, two bytes per pixel, high byte first. Display
//! frames are RGB888, three bytes per pixel. Both are row-major with no
//! row padding.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::pixel::{RAW_BYTES_PER_PIXEL, RGB_BYTES_PER_PIXEL};

// ── FrameFormat ──────────────────────────────────────────────────

/// Dimensions of the camera raster.
///
/// The remote camera only produces QVGA. The constructor stays private
/// to the crate so the rest of the pipeline can be tested on tiny frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameFormat {
    width: u32,
    height: u32,
}

impl FrameFormat {
    /// 320×240, the only format the camera emits.
    pub const QVGA: FrameFormat = FrameFormat {
        width: 320,
        height: 240,
    };

    pub(crate) const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn width(self) -> u32 {
        self.width
    }

    pub const fn height(self) -> u32 {
        self.height
    }

    pub const fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Size of one raw RGB565 frame in bytes.
    pub const fn raw_len(self) -> usize {
        self.pixel_count() * RAW_BYTES_PER_PIXEL
    }

    /// Size of one converted RGB888 frame in bytes.
    pub const fn display_len(self) -> usize {
        self.pixel_count() * RGB_BYTES_PER_PIXEL
    }
}

impl Default for FrameFormat {
    fn default() -> Self {
        Self::QVGA
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ── BufferMode ───────────────────────────────────────────────────

/// How many raw slots the frame store rotates through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferMode {
    /// One slot, rewritten in place every frame.
    Single,
    /// Two slots; the fill index flips on every completed frame.
    #[default]
    Double,
}

impl BufferMode {
    pub const fn slot_count(self) -> usize {
        match self {
            BufferMode::Single => 1,
            BufferMode::Double => 2,
        }
    }
}

// ── DisplayFrame ─────────────────────────────────────────────────

/// A completed, converted frame ready for the renderer.
///
/// The pixel data is shared and immutable; cloning is cheap and the
/// renderer can hold on to it while the next frame is being received.
#[derive(Clone)]
pub struct DisplayFrame {
    /// Monotonic frame counter, starting at 1 for the first frame.
    pub sequence: u64,
    /// When the last slice of this frame landed.
    pub completed_at: Instant,
    /// Raster dimensions.
    pub format: FrameFormat,
    /// RGB888 pixels, `format.display_len()` bytes.
    pub data: Arc<[u8]>,
}

impl DisplayFrame {
    pub fn width(&self) -> u32 {
        self.format.width()
    }

    pub fn height(&self) -> u32 {
        self.format.height()
    }

    /// Returns one row of RGB triples.
    ///
    /// # Panics
    ///
    /// Panics if `y` is not below the frame height.
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.format.width() as usize * RGB_BYTES_PER_PIXEL;
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    /// Returns the `[r, g, b]` triple at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let offset = (y as usize * self.format.width() as usize + x as usize) * RGB_BYTES_PER_PIXEL;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ]
    }
}

impl fmt::Debug for DisplayFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayFrame")
            .field("sequence", &self.sequence)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qvga_sizes() {
        let f = FrameFormat::QVGA;
        assert_eq!(f.raw_len(), 153_600);
        assert_eq!(f.display_len(), 230_400);
        assert_eq!(f.to_string(), "320x240");
    }

    #[test]
    fn pixel_and_row_addressing() {
        let format = FrameFormat::new(2, 2);
        let data: Vec<u8> = (0..12).collect();
        let frame = DisplayFrame {
            sequence: 1,
            completed_at: Instant::now(),
            format,
            data: data.into(),
        };
        assert_eq!(frame.pixel(1, 0), [3, 4, 5]);
        assert_eq!(frame.pixel(0, 1), [6, 7, 8]);
        assert_eq!(frame.row(1), &[6, 7, 8, 9, 10, 11]);
    }

    #[test]
    #[should_panic]
    fn row_past_the_bottom_panics() {
        let format = FrameFormat::new(2, 2);
        let frame = DisplayFrame {
            sequence: 1,
            completed_at: Instant::now(),
            format,
            data: vec![0u8; format.display_len()].into(),
        };
        frame.row(2);
    }
}
