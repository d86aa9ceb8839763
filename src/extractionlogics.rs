use std::io::{self, Read};

use log::warn;

use crate::bitlogics::{get_bit_from_channel, set_bit_in_slice};
use crate::error::Result;
use crate::framegeometry::{FrameGeometry, BITS_PER_DOT};
use crate::injectionextraction::Frame;
use crate::videoframe::CapturedFrame;

/// Read the raw RGB24 stream decoded by the codec, one fixed-size frame at a time.
///
/// Frames are numbered in the order they come out of the codec.
pub struct CapturedFrameReader<R> {
    reader: R,
    frame_len: usize,
    next_index: u64,
    done: bool,
}

impl<R: Read> CapturedFrameReader<R> {
    pub fn new(reader: R, geometry: &FrameGeometry) -> CapturedFrameReader<R> {
        CapturedFrameReader {
            reader,
            frame_len: geometry.extract_frame_len(),
            next_index: 0,
            done: false,
        }
    }

    /// Fill a whole frame. Returns how many bytes were read before EOF.
    fn fill(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buffer.len() {
            match self.reader.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl<R: Read> Iterator for CapturedFrameReader<R> {
    type Item = io::Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut buffer = vec![0u8; self.frame_len];
        match self.fill(&mut buffer) {
            Ok(n) if n == self.frame_len => {
                let index = self.next_index;
                self.next_index += 1;
                Some(Ok(Frame::new(index, buffer)))
            }
            Ok(n) => {
                self.done = true;
                if n > 0 {
                    warn!(
                        "Dropping partial frame {} ({} of {} bytes)",
                        self.next_index, n, self.frame_len
                    );
                }
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Read a dot-matrix bitmap back into its payload.
///
/// Only the pixel at the center of each macro-dot is sampled, and each channel
/// counts as a 1 when its high bit is set. Bits are written most significant
/// first, in the same row-major dot order used for packing.
pub fn unpack_frame(geometry: &FrameGeometry, frame: &CapturedFrame) -> Vec<u8> {
    let capacity = geometry.payload_capacity();
    let total_bits = capacity * 8;
    let mut payload = vec![0u8; capacity];

    'dots: for dot_index in 0..geometry.dot_count() {
        let (x, y) = geometry.dot_center(dot_index);
        let color = frame.read_coordinate_color(x, y);
        for (channel, value) in color.channels().into_iter().enumerate() {
            let bit_position = dot_index * BITS_PER_DOT + channel;
            if bit_position >= total_bits {
                break 'dots;
            }
            if get_bit_from_channel(value) {
                set_bit_in_slice(&mut payload, bit_position, true);
            }
        }
    }
    payload
}

/// Worker transform of the extract direction: RGB24 bitmap in, raw segment out
pub fn extract_frame(geometry: &FrameGeometry, frame: Frame) -> Result<Frame> {
    let captured = CapturedFrame::from_raw(geometry, frame.payload)?;
    Ok(Frame::new(frame.index, unpack_frame(geometry, &captured)))
}
