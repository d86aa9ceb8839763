use clap::Parser;
use clap::ValueEnum;

use crate::error::{PipelineError, Result};
use crate::framegeometry::FrameGeometry;

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub enum AppMode {
    /// Turn a file into a video
    Inject,
    /// Get the file back from a video
    Extract,
}

/// CLI arguments
///
/// The command line accepts the options to inject a file into a video and
/// extract it back. The full list of options are available in the `CliData` struct.
///
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)] // Read from `Cargo.toml`
pub struct CliData {
    /// The file to inject, or the video to extract from
    #[arg(short, long)]
    pub input_file_path: Option<String>,

    /// The video to produce, or the file to rebuild
    #[arg(short, long)]
    pub output_path: Option<String>,

    /// Possible values:
    /// "inject" = inject the file into a video.
    /// "extract" = extract from a video the file.
    #[arg(short = 'm', long, value_enum)]
    pub mode: Option<AppMode>,

    /// Number of workers drawing or reading frames in parallel
    #[arg(short, long)]
    pub threads: Option<usize>,

    #[arg(short, long)]
    pub width: Option<u16>,

    #[arg(short = 'g', long)]
    pub height: Option<u16>,

    /// Each group of 3 bits is drawn as a square of `size x size` pixels.
    ///
    /// # Expected Values
    /// Must divide both the width and the height. Bigger dots survive lossy
    /// compression better but hold less data per frame.
    #[arg(short, long)]
    pub size: Option<u8>,

    #[arg(short, long)]
    pub fps: Option<u8>,

    /// Target bitrate given to the encoder, e.g. "30M"
    #[arg(short, long)]
    pub bitrate: Option<String>,

    /// Encoder used by ffmpeg, e.g. "libx264" or "h264_nvenc"
    #[arg(short = 'c', long)]
    pub video_codec: Option<String>,

    #[arg(short = 'p', long)]
    pub show_progress: bool,
}

/// Required options for the injection of the file into a video
#[derive(Clone, Debug)]
pub struct InjectOptions {
    pub file_path: String,
    pub output_video_file: String,
    pub fps: u8,
    pub geometry: FrameGeometry,
    pub bitrate: String,
    pub video_codec: String,
    pub threads: usize,
    pub show_progress: bool,
}

/// Required options for the extraction of the file from a video
#[derive(Clone, Debug)]
pub struct ExtractOptions {
    pub video_file_path: String,
    pub extracted_file_path: String,
    pub geometry: FrameGeometry,
    pub threads: usize,
    pub show_progress: bool,
}

#[derive(Clone, Debug)]
pub enum VideoOptions {
    InjectInVideo(InjectOptions),
    ExtractFromVideo(ExtractOptions),
}

fn geometry_from_args(args: &CliData) -> Result<FrameGeometry> {
    let default = FrameGeometry::default();
    FrameGeometry::new(
        args.width.map_or(default.width, u32::from),
        args.height.map_or(default.height, u32::from),
        args.size.map_or(default.dot_size, u32::from),
    )
}

fn threads_from_args(args: &CliData) -> Result<usize> {
    let threads = args.threads.unwrap_or(3);
    if threads < 1 {
        return Err(PipelineError::InvalidOptions(
            "cannot spawn less than 1 thread".to_string(),
        ));
    }
    Ok(threads)
}

/// Extract from the command line (CLI) argument the option.
/// Depending of the mode, the function returns
/// the proper formed structure or an error telling what argument
/// is missing or wrong
///
/// # Arguments
/// args - The command line argument that may contain inject or extract information
pub fn extract_options(args: CliData) -> Result<VideoOptions> {
    let geometry = geometry_from_args(&args)?;
    let threads = threads_from_args(&args)?;
    match args.mode {
        Some(AppMode::Inject) => {
            let file_path = args.input_file_path.ok_or_else(|| {
                PipelineError::InvalidOptions("missing input file".to_string())
            })?;
            Ok(VideoOptions::InjectInVideo(InjectOptions {
                file_path,
                output_video_file: args
                    .output_path
                    .unwrap_or_else(|| "video.mp4".to_string()),
                fps: args.fps.unwrap_or(60),
                geometry,
                bitrate: args.bitrate.unwrap_or_else(|| "30M".to_string()),
                video_codec: args.video_codec.unwrap_or_else(|| "libx264".to_string()),
                threads,
                show_progress: args.show_progress,
            }))
        }
        Some(AppMode::Extract) => Ok(VideoOptions::ExtractFromVideo(ExtractOptions {
            video_file_path: args
                .input_file_path
                .unwrap_or_else(|| "video.mp4".to_string()),
            extracted_file_path: args
                .output_path
                .ok_or_else(|| PipelineError::InvalidOptions("missing output file".to_string()))?,
            geometry,
            threads,
            show_progress: args.show_progress,
        })),
        None => Err(PipelineError::InvalidOptions(
            "mode is required".to_string(),
        )),
    }
}
