//! Ordered emission of frames that finish processing out of order.
//!
//! Workers complete frames in any order. A single [`Reassembler`] owns the
//! cursor and the reorder buffer and hands frames to its [`FrameSink`] strictly
//! in ascending, gap-free index order.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Seek, SeekFrom, Write};

use log::{debug, info, warn};
use pretty_bytes_rust::pretty_bytes;

use crate::error::{PipelineError, Result};
use crate::headerlogics::{FrameLayout, LengthHeader};
use crate::injectionextraction::{Frame, HEADER_SIZE};

/// Destination of frames once they are back in order.
pub trait FrameSink {
    /// Called exactly once per index, in ascending order starting at 0.
    fn write_frame(&mut self, frame: Frame) -> Result<()>;

    /// Total frames the sink needs before it is complete, once known.
    fn expected_frames(&self) -> Option<u64>;
}

/// Frames completed ahead of the cursor, kept sorted by index.
#[derive(Debug, Default)]
pub struct ReorderBuffer {
    pending: BTreeMap<u64, Vec<u8>>,
}

impl ReorderBuffer {
    pub fn insert(&mut self, frame: Frame) -> Result<()> {
        if self.pending.contains_key(&frame.index) {
            return Err(PipelineError::DuplicateFrame { index: frame.index });
        }
        self.pending.insert(frame.index, frame.payload);
        Ok(())
    }

    /// Pop the lowest buffered frame if it is the one the cursor waits for
    pub fn pop_if_next(&mut self, cursor: u64) -> Option<Frame> {
        let entry = self.pending.first_entry()?;
        if *entry.key() != cursor {
            return None;
        }
        let (index, payload) = entry.remove_entry();
        Some(Frame::new(index, payload))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Single owner of the reassembly state: cursor, reorder buffer and sink.
pub struct Reassembler<S> {
    sink: S,
    cursor: u64,
    buffer: ReorderBuffer,
    peak_buffered: usize,
}

impl<S: FrameSink> Reassembler<S> {
    pub fn new(sink: S) -> Reassembler<S> {
        Reassembler {
            sink,
            cursor: 0,
            buffer: ReorderBuffer::default(),
            peak_buffered: 0,
        }
    }

    /// Next frame index waited for
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn peak_buffered(&self) -> usize {
        self.peak_buffered
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Accept a completed frame, emitting it and any run of buffered frames
    /// it unblocks.
    pub fn push(&mut self, frame: Frame) -> Result<()> {
        if frame.index < self.cursor {
            return Err(PipelineError::DuplicateFrame { index: frame.index });
        }
        if frame.index > self.cursor {
            debug!(
                "Buffering frame {} while waiting for frame {}",
                frame.index, self.cursor
            );
            self.buffer.insert(frame)?;
            self.peak_buffered = self.peak_buffered.max(self.buffer.len());
            return Ok(());
        }

        self.emit(frame)?;
        while let Some(next) = self.buffer.pop_if_next(self.cursor) {
            self.emit(next)?;
        }
        Ok(())
    }

    fn emit(&mut self, frame: Frame) -> Result<()> {
        self.sink.write_frame(frame)?;
        self.cursor += 1;
        Ok(())
    }

    /// Check nothing went missing once the upstream channel closed, and give
    /// the sink back.
    pub fn finish(self) -> Result<S> {
        let expected = self.sink.expected_frames();
        let short = expected.map_or(false, |expected| self.cursor < expected);
        if short || !self.buffer.is_empty() {
            return Err(PipelineError::MissingFrames {
                cursor: self.cursor,
                expected: expected.unwrap_or(self.cursor),
                buffered: self.buffer.len(),
            });
        }
        Ok(self.sink)
    }
}

/// Inject side sink: writes bitmaps one after the other into the codec input.
pub struct StreamEmitter<W> {
    out: W,
    expected: u64,
    bytes_written: u64,
}

impl<W: Write> StreamEmitter<W> {
    pub fn new(out: W, expected: u64) -> StreamEmitter<W> {
        StreamEmitter {
            out,
            expected,
            bytes_written: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn into_inner(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

impl<W: Write> FrameSink for StreamEmitter<W> {
    fn write_frame(&mut self, frame: Frame) -> Result<()> {
        self.out.write_all(&frame.payload)?;
        self.bytes_written += frame.payload.len() as u64;
        Ok(())
    }

    fn expected_frames(&self) -> Option<u64> {
        Some(self.expected)
    }
}

/// A file that can be sized up front and written at any offset.
pub trait OutputFile: Write + Seek {
    fn truncate_to(&mut self, len: u64) -> std::io::Result<()>;
}

impl OutputFile for File {
    fn truncate_to(&mut self, len: u64) -> std::io::Result<()> {
        self.set_len(len)
    }
}

impl OutputFile for Cursor<Vec<u8>> {
    fn truncate_to(&mut self, len: u64) -> std::io::Result<()> {
        let len = usize::try_from(len).map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} bytes do not fit in memory", len),
            )
        })?;
        let buffer = self.get_mut();
        if len > buffer.len() {
            buffer
                .try_reserve_exact(len - buffer.len())
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::OutOfMemory, e))?;
        }
        buffer.resize(len, 0);
        Ok(())
    }
}

fn frame_data(frame: &Frame, start: usize, end: usize) -> Result<&[u8]> {
    frame.payload.get(start..end).ok_or_else(|| {
        PipelineError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!(
                "frame {} holds {} bytes, {} expected",
                frame.index,
                frame.payload.len(),
                end
            ),
        ))
    })
}

/// Extract side sink: rebuilds the original file.
///
/// Frame 0 is special: its first bytes are the length header, which sizes the
/// file and tells where every later frame lands and where the last one stops.
pub struct FileAssembler<'a, O> {
    out: &'a mut O,
    capacity: usize,
    layout: Option<FrameLayout>,
    next_write_byte: u64,
    bytes_written: u64,
    ignored_frames: u64,
}

impl<'a, O: OutputFile> FileAssembler<'a, O> {
    pub fn new(out: &'a mut O, capacity: usize) -> FileAssembler<'a, O> {
        FileAssembler {
            out,
            capacity,
            layout: None,
            next_write_byte: 0,
            bytes_written: 0,
            ignored_frames: 0,
        }
    }

    pub fn layout(&self) -> Option<&FrameLayout> {
        self.layout.as_ref()
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn write_at(&mut self, data: &[u8], offset: u64) -> Result<()> {
        self.out.seek(SeekFrom::Start(offset))?;
        self.out.write_all(data)?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    fn write_header_frame(&mut self, frame: Frame) -> Result<()> {
        let header = LengthHeader::from_bytes(&frame.payload)?;
        let layout = FrameLayout::from_header(header, self.capacity)?;
        info!(
            "Length header found: {} in {} frames",
            pretty_bytes(header.byte_len, None),
            layout.total_frames()
        );
        self.out.truncate_to(header.byte_len)?;

        let end = HEADER_SIZE + layout.first_frame_data_len();
        self.write_at(frame_data(&frame, HEADER_SIZE, end)?, 0)?;
        self.next_write_byte = layout.frame_offset(1);
        self.layout = Some(layout);
        Ok(())
    }
}

impl<O: OutputFile> FrameSink for FileAssembler<'_, O> {
    fn write_frame(&mut self, frame: Frame) -> Result<()> {
        let layout = match self.layout {
            Some(layout) => layout,
            None => return self.write_header_frame(frame),
        };

        let data_len = layout.frame_data_len(frame.index);
        if data_len == 0 {
            if self.ignored_frames == 0 {
                warn!(
                    "Ignoring frame {} and any later one: past the last data frame {}",
                    frame.index,
                    layout.last_frame_index()
                );
            }
            self.ignored_frames += 1;
            return Ok(());
        }

        let offset = self.next_write_byte;
        self.write_at(frame_data(&frame, 0, data_len)?, offset)?;
        self.next_write_byte += layout.capacity as u64;
        Ok(())
    }

    fn expected_frames(&self) -> Option<u64> {
        self.layout.map(|layout| layout.total_frames())
    }
}
