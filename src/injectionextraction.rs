/// Number of bytes of the big-endian length header that prefixes the file data
pub const HEADER_SIZE: usize = 8;

///
/// Represent a single pixel of color (R, G, B)
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn channels(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// One unit of work moving through the pipeline.
///
/// The index is given once, when the frame is chunked (inject) or captured
/// from the codec (extract), and never changes. The payload is swapped in place
/// at every stage: raw bytes become a pixel bitmap on inject, and a pixel bitmap
/// becomes raw bytes on extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub index: u64,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(index: u64, payload: Vec<u8>) -> Frame {
        Frame { index, payload }
    }
}
