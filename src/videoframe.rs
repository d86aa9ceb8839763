use image::{Rgb, RgbImage, Rgba, RgbaImage};

use crate::error::{PipelineError, Result};
use crate::framegeometry::FrameGeometry;
use crate::injectionextraction::Color;

/// Define a single frame that the video will play, as written to the codec
/// E.g. on a 60fps video, there will be 60 VideoFrame every second
///
/// The buffer is RGBA. Alpha is never written and stays at 0 like every channel
/// of a dot that received no data.
#[derive(Clone)]
pub struct VideoFrame {
    pub image: RgbaImage,
}

impl VideoFrame {
    pub fn new(width: u32, height: u32) -> VideoFrame {
        VideoFrame {
            image: RgbaImage::new(width, height),
        }
    }

    /// Paint a `size x size` block starting at (x, y)
    pub fn write(&mut self, r: u8, g: u8, b: u8, x: u32, y: u32, size: u32) {
        for i in 0..size {
            for j in 0..size {
                self.image.put_pixel(x + j, y + i, Rgba([r, g, b, 0]));
            }
        }
    }

    pub fn read_coordinate_color(&self, x: u32, y: u32) -> Color {
        let Rgba([r, g, b, _]) = *self.image.get_pixel(x, y);
        Color { r, g, b }
    }

    /// Raw row-major RGBA bytes, ready for the codec input
    pub fn into_bytes(self) -> Vec<u8> {
        self.image.into_raw()
    }
}

/// A single frame as decoded by the codec: tightly packed RGB24 pixels.
pub struct CapturedFrame {
    pub image: RgbImage,
}

impl CapturedFrame {
    pub fn from_raw(geometry: &FrameGeometry, bytes: Vec<u8>) -> Result<CapturedFrame> {
        let len = bytes.len();
        RgbImage::from_raw(geometry.width, geometry.height, bytes)
            .map(|image| CapturedFrame { image })
            .ok_or_else(|| {
                PipelineError::InvalidGeometry(format!(
                    "captured frame of {} bytes does not fit {}x{} RGB",
                    len, geometry.width, geometry.height
                ))
            })
    }

    pub fn read_coordinate_color(&self, x: u32, y: u32) -> Color {
        let Rgb([r, g, b]) = *self.image.get_pixel(x, y);
        Color { r, g, b }
    }
}
