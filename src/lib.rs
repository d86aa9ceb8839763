mod bitlogics;
mod codecprocess;
mod error;
mod extractionlogics;
mod framegeometry;
mod headerlogics;
mod injectionextraction;
mod injectionlogics;
pub mod options;
mod pipeline;
mod reassembly;
mod videoframe;

use std::fs::File;
use std::io::BufReader;

use log::info;

use codecprocess::{DecoderProcess, EncoderProcess};

// Re-export for external access (main.rs, tests and benches)
pub use crate::error::{PipelineError, Result};
pub use crate::extractionlogics::{extract_frame, unpack_frame, CapturedFrameReader};
pub use crate::framegeometry::FrameGeometry;
pub use crate::headerlogics::{FrameLayout, LengthHeader};
pub use crate::injectionextraction::{Color, Frame, HEADER_SIZE};
pub use crate::injectionlogics::{inject_frame, pack_frame, Chunker};
pub use crate::options::{extract_options, CliData, ExtractOptions, InjectOptions, VideoOptions};
pub use crate::pipeline::{
    run_extract_pipeline, run_inject_pipeline, PipelineReport, PipelineSettings,
};
pub use crate::reassembly::{
    FileAssembler, FrameSink, OutputFile, Reassembler, ReorderBuffer, StreamEmitter,
};
pub use crate::videoframe::{CapturedFrame, VideoFrame};

/// Execute video logics
/// Two executions possible: inject a file into a video or extract it.
pub fn execute_with_video_options(options: VideoOptions) -> Result<PipelineReport> {
    match options {
        VideoOptions::InjectInVideo(n) => inject_file(&n),
        VideoOptions::ExtractFromVideo(n) => extract_file(&n),
    }
}

fn inject_file(options: &InjectOptions) -> Result<PipelineReport> {
    let file = File::open(&options.file_path)?;
    let byte_len = file.metadata()?.len();
    info!("Input file: {}", options.file_path);

    let mut encoder = EncoderProcess::spawn(options)?;
    let result = encoder.take_input().and_then(|input| {
        run_inject_pipeline(
            BufReader::new(file),
            byte_len,
            input,
            &PipelineSettings::from(options),
        )
    });
    match result {
        Ok(report) => {
            encoder.finish()?;
            info!("Video exported successfully");
            Ok(report)
        }
        Err(e) => Err(encoder.abort(e)),
    }
}

fn extract_file(options: &ExtractOptions) -> Result<PipelineReport> {
    let mut file = File::create(&options.extracted_file_path)?;

    let mut decoder = DecoderProcess::spawn(options)?;
    let result = decoder.take_output().and_then(|output| {
        run_extract_pipeline(
            BufReader::new(output),
            &mut file,
            &PipelineSettings::from(options),
        )
    });
    match result {
        Ok(report) => {
            decoder.finish()?;
            info!("File extracted to {}", options.extracted_file_path);
            Ok(report)
        }
        Err(e) => Err(decoder.abort(e)),
    }
}
