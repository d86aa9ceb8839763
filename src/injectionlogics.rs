use std::io::{self, Read};

use crate::bitlogics::{get_bit_in_slice, get_channel_for_bit};
use crate::framegeometry::{FrameGeometry, BITS_PER_DOT};
use crate::headerlogics::{FrameLayout, LengthHeader};
use crate::injectionextraction::Frame;
use crate::videoframe::VideoFrame;

/// Cut the file, prefixed with its length header, into payload segments of one
/// frame each.
///
/// The source is read lazily. Segments are exactly what chunking
/// `header ++ file` in steps of the frame capacity gives; only the last one
/// may be shorter.
pub struct Chunker<R> {
    reader: R,
    layout: FrameLayout,
    next_index: u64,
}

impl<R: Read> Chunker<R> {
    pub fn new(reader: R, byte_len: u64, geometry: &FrameGeometry) -> Chunker<R> {
        Chunker {
            reader,
            layout: FrameLayout::new(LengthHeader::new(byte_len), geometry.payload_capacity()),
            next_index: 0,
        }
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    fn read_segment(&mut self, index: u64) -> io::Result<Vec<u8>> {
        let data_len = self.layout.frame_data_len(index);
        let mut payload = Vec::with_capacity(self.layout.capacity);
        if index == 0 {
            payload.extend_from_slice(&LengthHeader::new(self.layout.byte_len).to_bytes());
        }
        let start = payload.len();
        payload.resize(start + data_len, 0);
        self.reader.read_exact(&mut payload[start..])?;
        Ok(payload)
    }
}

impl<R: Read> Iterator for Chunker<R> {
    type Item = io::Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        let total = self.layout.total_frames();
        if self.next_index >= total {
            return None;
        }
        let index = self.next_index;
        let segment = self.read_segment(index);
        // A failed read ends the iteration
        self.next_index = if segment.is_ok() { index + 1 } else { total };
        Some(segment.map(|payload| Frame::new(index, payload)))
    }
}

/// Draw a payload segment as a dot-matrix bitmap.
///
/// Bits are read most significant first, three per macro-dot (R, G then B),
/// and dots are filled row by row. A channel is 255 for a 1 and 0 for a 0.
/// Dots past the end of the payload are left black.
pub fn pack_frame(geometry: &FrameGeometry, payload: &[u8]) -> VideoFrame {
    debug_assert!(payload.len() <= geometry.payload_capacity());
    let mut frame = VideoFrame::new(geometry.width, geometry.height);
    let total_bits = payload.len() * 8;
    let used_dots = total_bits.div_ceil(BITS_PER_DOT).min(geometry.dot_count());

    for dot_index in 0..used_dots {
        let mut channels = [0u8; BITS_PER_DOT];
        for (channel, value) in channels.iter_mut().enumerate() {
            if let Some(bit) = get_bit_in_slice(payload, dot_index * BITS_PER_DOT + channel) {
                *value = get_channel_for_bit(bit);
            }
        }
        let (x, y) = geometry.dot_origin(dot_index);
        frame.write(
            channels[0],
            channels[1],
            channels[2],
            x,
            y,
            geometry.dot_size,
        );
    }
    frame
}

/// Worker transform of the inject direction: raw segment in, RGBA bitmap out
pub fn inject_frame(geometry: &FrameGeometry, frame: Frame) -> Frame {
    let bitmap = pack_frame(geometry, &frame.payload).into_bytes();
    Frame::new(frame.index, bitmap)
}
