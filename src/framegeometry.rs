use crate::error::{PipelineError, Result};
use crate::injectionextraction::HEADER_SIZE;

/// Bits stored by a single macro-dot: one per R, G and B channel
pub const BITS_PER_DOT: usize = 3;

/// Bytes per pixel of the stream written to the codec (RGBA)
pub const INJECT_BYTES_PER_PIXEL: usize = 4;

/// Bytes per pixel of the stream read back from the codec (RGB24)
pub const EXTRACT_BYTES_PER_PIXEL: usize = 3;

/// Geometry both directions must agree on.
///
/// The frame is cut in a grid of `dot_size x dot_size` macro-dots. The
/// geometry is validated once and then shared unchanged by every worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub dot_size: u32,
}

impl Default for FrameGeometry {
    fn default() -> Self {
        FrameGeometry {
            width: 1920,
            height: 1080,
            dot_size: 8,
        }
    }
}

impl FrameGeometry {
    pub fn new(width: u32, height: u32, dot_size: u32) -> Result<FrameGeometry> {
        if width == 0 || height == 0 || dot_size == 0 {
            return Err(PipelineError::InvalidGeometry(format!(
                "width ({}), height ({}) and dot size ({}) must be greater than 0",
                width, height, dot_size
            )));
        }
        if width % dot_size != 0 || height % dot_size != 0 {
            return Err(PipelineError::InvalidGeometry(format!(
                "dot size {} must divide both {} and {}",
                dot_size, width, height
            )));
        }
        let geometry = FrameGeometry {
            width,
            height,
            dot_size,
        };
        // Frame 0 must hold the header and at least one byte of data
        if geometry.payload_capacity() <= HEADER_SIZE {
            return Err(PipelineError::InvalidGeometry(format!(
                "a {}x{} frame with dot size {} only holds {} bytes, at least {} are needed",
                width,
                height,
                dot_size,
                geometry.payload_capacity(),
                HEADER_SIZE + 1
            )));
        }
        Ok(geometry)
    }

    /// Macro-dots per row
    pub fn columns(&self) -> u32 {
        self.width / self.dot_size
    }

    /// Macro-dots per column
    pub fn rows(&self) -> u32 {
        self.height / self.dot_size
    }

    pub fn dot_count(&self) -> usize {
        self.columns() as usize * self.rows() as usize
    }

    /// Bytes of payload a single frame carries
    pub fn payload_capacity(&self) -> usize {
        self.dot_count() * BITS_PER_DOT / 8
    }

    pub fn inject_frame_len(&self) -> usize {
        self.width as usize * self.height as usize * INJECT_BYTES_PER_PIXEL
    }

    pub fn extract_frame_len(&self) -> usize {
        self.width as usize * self.height as usize * EXTRACT_BYTES_PER_PIXEL
    }

    /// Pixel coordinate of the top-left corner of a macro-dot, dots counted row-major
    pub fn dot_origin(&self, dot_index: usize) -> (u32, u32) {
        let columns = self.columns() as usize;
        let x = (dot_index % columns) as u32 * self.dot_size;
        let y = (dot_index / columns) as u32 * self.dot_size;
        (x, y)
    }

    /// Pixel sampled when reading a macro-dot back
    pub fn dot_center(&self, dot_index: usize) -> (u32, u32) {
        let (x, y) = self.dot_origin(dot_index);
        let half = self.dot_size / 2;
        (x + half, y + half)
    }
}
