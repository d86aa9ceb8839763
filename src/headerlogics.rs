use std::io;

use crate::error::{PipelineError, Result};
use crate::injectionextraction::HEADER_SIZE;

/// Largest length a header can announce: file offsets are signed 64-bit and
/// the header shares the stream with the data.
pub const MAX_FILE_LEN: u64 = i64::MAX as u64 - HEADER_SIZE as u64;

///
/// Information passed from the injection to the extraction.
///
/// The header is the exact byte count of the original file, written big-endian
/// in front of the file data. It only lives at the very start of frame 0 and is
/// stripped again when the file is rebuilt.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthHeader {
    pub byte_len: u64,
}

impl LengthHeader {
    pub fn new(byte_len: u64) -> LengthHeader {
        LengthHeader { byte_len }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        self.byte_len.to_be_bytes()
    }

    /// Read the header from the start of a frame payload
    pub fn from_bytes(payload: &[u8]) -> io::Result<LengthHeader> {
        let bytes: [u8; HEADER_SIZE] = payload
            .get(..HEADER_SIZE)
            .and_then(|slice| slice.try_into().ok())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "frame is too short to hold the length header",
                )
            })?;
        Ok(LengthHeader::new(u64::from_be_bytes(bytes)))
    }
}

/// Where every byte of the original file lands once it has been prefixed with
/// the header and cut in frames of `capacity` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub byte_len: u64,
    pub capacity: usize,
}

impl FrameLayout {
    /// `header.byte_len` must not exceed [`MAX_FILE_LEN`]; headers read back
    /// from a video go through [`FrameLayout::from_header`] instead.
    pub fn new(header: LengthHeader, capacity: usize) -> FrameLayout {
        FrameLayout {
            byte_len: header.byte_len,
            capacity,
        }
    }

    /// Layout of a header decoded from frame 0, which can be anything the
    /// video happened to contain.
    pub fn from_header(header: LengthHeader, capacity: usize) -> Result<FrameLayout> {
        let fits = header
            .byte_len
            .checked_add(HEADER_SIZE as u64)
            .map_or(false, |stream_len| stream_len <= i64::MAX as u64);
        if !fits {
            return Err(PipelineError::InvalidHeader {
                byte_len: header.byte_len,
            });
        }
        Ok(FrameLayout::new(header, capacity))
    }

    fn stream_len(&self) -> u64 {
        self.byte_len.saturating_add(HEADER_SIZE as u64)
    }

    /// ceil((len + header) / capacity), never 0 since the header alone needs a frame
    pub fn total_frames(&self) -> u64 {
        self.stream_len().div_ceil(self.capacity as u64)
    }

    pub fn last_frame_index(&self) -> u64 {
        self.total_frames() - 1
    }

    /// File bytes carried by frame 0 after its header
    pub fn first_frame_data_len(&self) -> usize {
        let room = (self.capacity - HEADER_SIZE) as u64;
        self.byte_len.min(room) as usize
    }

    /// Bytes of the last frame that are data, the rest is padding
    pub fn trailing_len(&self) -> usize {
        (self.stream_len() - self.last_frame_index() * self.capacity as u64) as usize
    }

    /// File bytes carried by a frame. Frames past the last one carry nothing.
    pub fn frame_data_len(&self, index: u64) -> usize {
        let last = self.last_frame_index();
        if index == 0 {
            self.first_frame_data_len()
        } else if index < last {
            self.capacity
        } else if index == last {
            self.trailing_len()
        } else {
            0
        }
    }

    /// Offset in the rebuilt file where the data of a frame starts
    pub fn frame_offset(&self, index: u64) -> u64 {
        if index == 0 {
            0
        } else {
            (self.capacity - HEADER_SIZE) as u64 + (index - 1) * self.capacity as u64
        }
    }
}
