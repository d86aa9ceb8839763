use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::bounded;
use indicatif::ProgressBar;
use log::{debug, info, trace};
use pretty_bytes_rust::pretty_bytes;

use crate::error::{PipelineError, Result};
use crate::extractionlogics::{extract_frame, CapturedFrameReader};
use crate::framegeometry::FrameGeometry;
use crate::injectionextraction::Frame;
use crate::injectionlogics::{inject_frame, Chunker};
use crate::options::{ExtractOptions, InjectOptions};
use crate::reassembly::{FileAssembler, FrameSink, OutputFile, Reassembler, StreamEmitter};

/// What both pipelines need to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub geometry: FrameGeometry,
    pub threads: usize,
    pub show_progress: bool,
}

impl From<&InjectOptions> for PipelineSettings {
    fn from(options: &InjectOptions) -> Self {
        PipelineSettings {
            geometry: options.geometry,
            threads: options.threads,
            show_progress: options.show_progress,
        }
    }
}

impl From<&ExtractOptions> for PipelineSettings {
    fn from(options: &ExtractOptions) -> Self {
        PipelineSettings {
            geometry: options.geometry,
            threads: options.threads,
            show_progress: options.show_progress,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Frames emitted to the codec, or decoded from it
    pub frames: u64,
    /// Bytes written to the codec input, or length of the rebuilt file
    pub bytes: u64,
    /// Deepest the reorder buffer got
    pub peak_buffered: usize,
    pub elapsed: Duration,
}

fn progress_bar(show_progress: bool, len: u64) -> ProgressBar {
    if show_progress {
        ProgressBar::new(len)
    } else {
        ProgressBar::hidden()
    }
}

/// Run `frames` through `threads` workers applying `transform`, and feed the
/// results to the reassembler as they complete.
///
/// One producer thread pulls frames from the source, the workers share the
/// input queue, and the calling thread is the only one touching the
/// reassembler. The worker to reassembler channel is a rendezvous channel so
/// workers wait until their frame is taken.
///
/// Returns the number of frames the producer dispatched.
fn run_frame_pipeline<I, T, S>(
    frames: I,
    transform: T,
    reassembler: &mut Reassembler<S>,
    threads: usize,
    progress: &ProgressBar,
) -> Result<u64>
where
    I: Iterator<Item = io::Result<Frame>> + Send,
    T: Fn(Frame) -> Result<Frame> + Sync,
    S: FrameSink,
{
    let transform = &transform;
    thread::scope(|scope| {
        let (input_tx, input_rx) = bounded::<Frame>(threads);
        let (output_tx, output_rx) = bounded::<Result<Frame>>(0);

        // ---- Producer ----
        let producer = scope.spawn(move || -> Result<u64> {
            let mut dispatched = 0;
            for frame in frames {
                if input_tx.send(frame?).is_err() {
                    // Reassembly stopped, its error is the one reported
                    break;
                }
                dispatched += 1;
            }
            trace!("Producer done after {} frames", dispatched);
            Ok(dispatched)
        });

        // ---- Workers ----
        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads {
            let rx = input_rx.clone();
            let tx = output_tx.clone();
            workers.push(scope.spawn(move || {
                trace!("Worker {} started", i);
                for frame in rx.iter() {
                    if tx.send(transform(frame)).is_err() {
                        break;
                    }
                }
                trace!("Worker {} finished", i);
            }));
        }
        drop(input_rx);
        drop(output_tx);

        // ---- Ordered reassembly ----
        let mut reassembled: Result<()> = Ok(());
        for completed in output_rx.iter() {
            if let Err(e) = completed.and_then(|frame| reassembler.push(frame)) {
                reassembled = Err(e);
                break;
            }
            if let Some(total) = reassembler.sink().expected_frames() {
                progress.set_length(total);
            }
            progress.set_position(reassembler.cursor());
        }
        // Unblocks workers and producer if reassembly stopped early
        drop(output_rx);

        let produced = producer
            .join()
            .map_err(|_| PipelineError::WorkerPanicked("producer"))?;
        let mut worker_panicked = false;
        for worker in workers {
            worker_panicked |= worker.join().is_err();
        }

        reassembled?;
        let dispatched = produced?;
        if worker_panicked {
            return Err(PipelineError::WorkerPanicked("frame worker"));
        }
        Ok(dispatched)
    })
}

/// Turn the bytes of `reader` (exactly `byte_len` of them) into raw RGBA frames
/// written in order to `out`, the codec input.
pub fn run_inject_pipeline<R, W>(
    reader: R,
    byte_len: u64,
    out: W,
    settings: &PipelineSettings,
) -> Result<PipelineReport>
where
    R: Read + Send,
    W: Write,
{
    let start = Instant::now();
    let geometry = settings.geometry;
    let chunker = Chunker::new(reader, byte_len, &geometry);
    let total_frames = chunker.layout().total_frames();
    info!(
        "Injecting {} into {} frames of {} bytes with {} workers",
        pretty_bytes(byte_len, None),
        total_frames,
        geometry.payload_capacity(),
        settings.threads
    );

    let progress = progress_bar(settings.show_progress, total_frames);
    let mut reassembler = Reassembler::new(StreamEmitter::new(out, total_frames));
    let dispatched = run_frame_pipeline(
        chunker,
        |frame| Ok(inject_frame(&geometry, frame)),
        &mut reassembler,
        settings.threads,
        &progress,
    )?;
    debug!("{} frames dispatched to workers", dispatched);

    let frames = reassembler.cursor();
    let peak_buffered = reassembler.peak_buffered();
    let emitter = reassembler.finish()?;
    let bytes = emitter.bytes_written();
    emitter.into_inner()?;
    progress.finish_with_message("done");

    let elapsed = start.elapsed();
    info!(
        "Frames digested in: {:?} ({} frames, reorder buffer peaked at {})",
        elapsed, frames, peak_buffered
    );
    Ok(PipelineReport {
        frames,
        bytes,
        peak_buffered,
        elapsed,
    })
}

/// Read raw RGB24 frames from `reader`, the codec output, and rebuild the
/// original file into `out`.
pub fn run_extract_pipeline<R, O>(
    reader: R,
    out: &mut O,
    settings: &PipelineSettings,
) -> Result<PipelineReport>
where
    R: Read + Send,
    O: OutputFile,
{
    let start = Instant::now();
    let geometry = settings.geometry;
    info!(
        "Extracting {}x{} frames (dot size {}) with {} workers",
        geometry.width, geometry.height, geometry.dot_size, settings.threads
    );

    let frames = CapturedFrameReader::new(reader, &geometry);
    let progress = progress_bar(settings.show_progress, 0);
    let mut reassembler = Reassembler::new(FileAssembler::new(out, geometry.payload_capacity()));
    run_frame_pipeline(
        frames,
        |frame| extract_frame(&geometry, frame),
        &mut reassembler,
        settings.threads,
        &progress,
    )?;

    let byte_len = match reassembler.sink().layout() {
        Some(layout) => layout.byte_len,
        None => return Err(PipelineError::MissingHeader),
    };
    let frames = reassembler.cursor();
    let peak_buffered = reassembler.peak_buffered();
    let assembler = reassembler.finish()?;
    debug!("{} bytes written", assembler.bytes_written());
    drop(assembler);
    out.flush()?;
    progress.finish_with_message("done");

    let elapsed = start.elapsed();
    info!(
        "Video decoded in: {:?} ({} frames, {}, reorder buffer peaked at {})",
        elapsed,
        frames,
        pretty_bytes(byte_len, None),
        peak_buffered
    );
    Ok(PipelineReport {
        frames,
        bytes: byte_len,
        peak_buffered,
        elapsed,
    })
}

#[cfg(test)]
mod pipeline_tests {
    use super::*;
    use crate::reassembly::FrameSink;
    use std::io::Cursor;

    fn settings(threads: usize) -> PipelineSettings {
        PipelineSettings {
            geometry: FrameGeometry::new(64, 16, 4).unwrap(),
            threads,
            show_progress: false,
        }
    }

    struct CollectSink {
        indexes: Vec<u64>,
    }

    impl FrameSink for CollectSink {
        fn write_frame(&mut self, frame: Frame) -> Result<()> {
            self.indexes.push(frame.index);
            Ok(())
        }

        fn expected_frames(&self) -> Option<u64> {
            None
        }
    }

    #[test]
    fn test_frame_pipeline_delivers_in_order_with_many_workers() {
        let frames = (0..200u64).map(|i| Ok(Frame::new(i, vec![i as u8])));
        let mut reassembler = Reassembler::new(CollectSink {
            indexes: Vec::new(),
        });
        let dispatched = run_frame_pipeline(
            frames,
            |frame| {
                // Uneven work so workers finish out of order
                if frame.index % 7 == 0 {
                    thread::sleep(Duration::from_millis(1));
                }
                Ok(frame)
            },
            &mut reassembler,
            8,
            &ProgressBar::hidden(),
        )
        .unwrap();
        assert_eq!(dispatched, 200);
        let sink = reassembler.finish().unwrap();
        assert_eq!(sink.indexes, (0..200).collect::<Vec<u64>>());
    }

    #[test]
    fn test_frame_pipeline_reports_source_error() {
        let frames = (0..5u64).map(|i| {
            if i == 3 {
                Err(io::Error::new(io::ErrorKind::Other, "disk gone"))
            } else {
                Ok(Frame::new(i, Vec::new()))
            }
        });
        let mut reassembler = Reassembler::new(CollectSink {
            indexes: Vec::new(),
        });
        let result = run_frame_pipeline(
            frames,
            Ok,
            &mut reassembler,
            2,
            &ProgressBar::hidden(),
        );
        assert!(matches!(result, Err(PipelineError::Io(_))));
    }

    #[test]
    fn test_frame_pipeline_reports_transform_error() {
        let frames = (0..50u64).map(|i| Ok(Frame::new(i, Vec::new())));
        let mut reassembler = Reassembler::new(CollectSink {
            indexes: Vec::new(),
        });
        let result = run_frame_pipeline(
            frames,
            |frame| {
                if frame.index == 10 {
                    Err(PipelineError::InvalidGeometry("bad frame".to_string()))
                } else {
                    Ok(frame)
                }
            },
            &mut reassembler,
            3,
            &ProgressBar::hidden(),
        );
        assert!(matches!(result, Err(PipelineError::InvalidGeometry(_))));
    }

    #[test]
    fn test_inject_pipeline_frame_count_and_size() {
        let settings = settings(3);
        let data = vec![0xA5u8; 100];
        let mut out = Vec::new();
        let report = run_inject_pipeline(&data[..], 100, &mut out, &settings).unwrap();
        // 108 bytes in 24 byte frames
        assert_eq!(report.frames, 5);
        assert_eq!(out.len(), 5 * settings.geometry.inject_frame_len());
        assert_eq!(report.bytes, out.len() as u64);
    }

    #[test]
    fn test_extract_pipeline_empty_stream_has_no_header() {
        let settings = settings(2);
        let mut out = Cursor::new(Vec::new());
        let result = run_extract_pipeline(io::empty(), &mut out, &settings);
        assert!(matches!(result, Err(PipelineError::MissingHeader)));
    }

    #[test]
    fn test_extract_pipeline_rejects_white_header_frame() {
        let settings = settings(2);
        // Every dot reads as 1, so the header announces u64::MAX bytes
        let white = vec![0xFFu8; settings.geometry.extract_frame_len()];
        let mut out = Cursor::new(Vec::new());
        let result = run_extract_pipeline(&white[..], &mut out, &settings);
        assert!(matches!(
            result,
            Err(PipelineError::InvalidHeader { byte_len: u64::MAX })
        ));
        assert!(out.into_inner().is_empty());
    }
}
