use std::io;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use log::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::options::{ExtractOptions, InjectOptions};

pub const FFMPEG_EXECUTABLE_PATH: &str = "ffmpeg";

/// Keyframe interval of the produced video
const GOP_SIZE: u32 = 300;

fn spawn(program: &str, args: &[String], stdin: Stdio, stdout: Stdio) -> Result<Child> {
    debug!("Starting {} {}", program, args.join(" "));
    Command::new(program)
        .args(args)
        .stdin(stdin)
        .stdout(stdout)
        .spawn()
        .map_err(|source| PipelineError::CodecSpawn {
            program: program.to_string(),
            source,
        })
}

fn wait_success(child: &mut Child) -> Result<()> {
    let status = child.wait()?;
    if !status.success() {
        return Err(PipelineError::CodecExit(status));
    }
    Ok(())
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        warn!("Unable to stop codec process: {}", e);
    }
    if let Err(e) = child.wait() {
        warn!("Unable to reap codec process: {}", e);
    }
}

/// Stop a codec after the pipeline failed with `error`, and return the error
/// to report.
///
/// When the codec closed its pipe on its own (`pipe_closed`) it is waited for,
/// otherwise it is killed unless it already exited. A codec that exited with a
/// failure status is the root cause, so `CodecExit` replaces `error`.
fn stop(child: &mut Child, pipe_closed: bool, error: PipelineError) -> PipelineError {
    let status = if pipe_closed {
        child.wait().map(Some)
    } else {
        child.try_wait()
    };
    match status {
        Ok(Some(status)) if !status.success() => {
            debug!("Pipeline failed with: {}", error);
            PipelineError::CodecExit(status)
        }
        Ok(Some(_)) => error,
        Ok(None) => {
            kill(child);
            error
        }
        Err(e) => {
            warn!("Unable to get codec process status: {}", e);
            kill(child);
            error
        }
    }
}

/// Encoder arguments: raw RGBA frames on stdin, compressed video file out
pub fn encoder_args(options: &InjectOptions) -> Vec<String> {
    let fps = options.fps.to_string();
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(), // Overwrite output file if it exists
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgba".into(),
        "-s".into(),
        format!("{}x{}", options.geometry.width, options.geometry.height),
        "-framerate".into(),
        fps.clone(),
        "-i".into(),
        "-".into(), // Read input from pipe
        "-c:v".into(),
        options.video_codec.clone(),
        "-b:v".into(),
        options.bitrate.clone(),
        "-r".into(),
        fps,
        "-g".into(),
        GOP_SIZE.to_string(),
        "-an".into(),
        "-preset".into(),
        "fast".into(),
        options.output_video_file.clone(),
    ]
}

/// Decoder arguments: video file in, raw RGB24 frames on stdout
pub fn decoder_args(options: &ExtractOptions) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        options.video_file_path.clone(),
        "-vf".into(),
        "format=rgb24".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgb24".into(),
        "-an".into(),
        "-".into(),
    ]
}

/// Video encoder fed with raw frames through its stdin.
pub struct EncoderProcess {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl EncoderProcess {
    pub fn spawn(options: &InjectOptions) -> Result<EncoderProcess> {
        let child = spawn(
            FFMPEG_EXECUTABLE_PATH,
            &encoder_args(options),
            Stdio::piped(),
            Stdio::null(),
        )?;
        info!("Encoder started, writing {}", options.output_video_file);
        Ok(EncoderProcess::from_child(child))
    }

    fn from_child(mut child: Child) -> EncoderProcess {
        let stdin = child.stdin.take();
        EncoderProcess { child, stdin }
    }

    /// Hand the input pipe over to the frame emitter
    pub fn take_input(&mut self) -> Result<ChildStdin> {
        self.stdin.take().ok_or_else(|| {
            PipelineError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "encoder input was already taken",
            ))
        })
    }

    /// Close the input and wait for the video to be finalized
    pub fn finish(mut self) -> Result<()> {
        drop(self.stdin.take());
        wait_success(&mut self.child)
    }

    /// Stop the encoder after the pipeline failed. A broken input pipe means
    /// the encoder quit first, and its exit status is what gets reported.
    pub fn abort(mut self, error: PipelineError) -> PipelineError {
        drop(self.stdin.take());
        let pipe_closed =
            matches!(&error, PipelineError::Io(e) if e.kind() == io::ErrorKind::BrokenPipe);
        stop(&mut self.child, pipe_closed, error)
    }
}

/// Video decoder producing raw frames on its stdout.
pub struct DecoderProcess {
    child: Child,
    stdout: Option<ChildStdout>,
}

impl DecoderProcess {
    pub fn spawn(options: &ExtractOptions) -> Result<DecoderProcess> {
        let child = spawn(
            FFMPEG_EXECUTABLE_PATH,
            &decoder_args(options),
            Stdio::null(),
            Stdio::piped(),
        )?;
        info!("Decoder started, reading {}", options.video_file_path);
        Ok(DecoderProcess::from_child(child))
    }

    fn from_child(mut child: Child) -> DecoderProcess {
        let stdout = child.stdout.take();
        DecoderProcess { child, stdout }
    }

    pub fn take_output(&mut self) -> Result<ChildStdout> {
        self.stdout.take().ok_or_else(|| {
            PipelineError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "decoder output was already taken",
            ))
        })
    }

    pub fn finish(mut self) -> Result<()> {
        drop(self.stdout.take());
        wait_success(&mut self.child)
    }

    /// Stop the decoder after the pipeline failed. A stream that ended too
    /// early means the decoder quit, and its exit status is what gets reported.
    pub fn abort(mut self, error: PipelineError) -> PipelineError {
        drop(self.stdout.take());
        let pipe_closed = matches!(
            error,
            PipelineError::MissingHeader | PipelineError::MissingFrames { .. }
        );
        stop(&mut self.child, pipe_closed, error)
    }
}

#[cfg(test)]
mod codecprocess_tests {
    use super::*;
    use crate::framegeometry::FrameGeometry;

    fn inject_options() -> InjectOptions {
        InjectOptions {
            file_path: "in.bin".to_string(),
            output_video_file: "out.mp4".to_string(),
            fps: 60,
            geometry: FrameGeometry::default(),
            bitrate: "30M".to_string(),
            video_codec: "libx264".to_string(),
            threads: 3,
            show_progress: false,
        }
    }

    #[test]
    fn test_encoder_args_describe_raw_input() {
        let args = encoder_args(&inject_options());
        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo -pix_fmt rgba -s 1920x1080 -framerate 60 -i -"));
        assert!(joined.contains("-c:v libx264 -b:v 30M"));
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn test_decoder_args_write_rgb24_to_stdout() {
        let options = ExtractOptions {
            video_file_path: "video.mp4".to_string(),
            extracted_file_path: "out.bin".to_string(),
            geometry: FrameGeometry::default(),
            threads: 3,
            show_progress: false,
        };
        let args = decoder_args(&options);
        let joined = args.join(" ");
        assert!(joined.contains("-i video.mp4"));
        assert!(joined.contains("-pix_fmt rgb24"));
        assert_eq!(args.last().unwrap(), "-");
    }

    #[test]
    fn test_spawn_missing_program_is_codec_spawn_error() {
        let result = spawn(
            "this-codec-does-not-exist",
            &[],
            Stdio::null(),
            Stdio::null(),
        );
        assert!(matches!(result, Err(PipelineError::CodecSpawn { .. })));
    }

    fn shell(script: &str, stdin: Stdio, stdout: Stdio) -> Child {
        spawn("sh", &["-c".to_string(), script.to_string()], stdin, stdout).unwrap()
    }

    #[test]
    fn test_decoder_failure_replaces_missing_header() {
        let decoder = DecoderProcess::from_child(shell("exit 3", Stdio::null(), Stdio::piped()));
        let error = decoder.abort(PipelineError::MissingHeader);
        assert!(matches!(error, PipelineError::CodecExit(status) if status.code() == Some(3)));
    }

    #[test]
    fn test_decoder_success_keeps_missing_frames() {
        let decoder = DecoderProcess::from_child(shell("exit 0", Stdio::null(), Stdio::piped()));
        let error = decoder.abort(PipelineError::MissingFrames {
            cursor: 1,
            expected: 4,
            buffered: 0,
        });
        assert!(matches!(error, PipelineError::MissingFrames { cursor: 1, .. }));
    }

    #[test]
    fn test_running_decoder_is_killed_and_error_kept() {
        let decoder = DecoderProcess::from_child(shell("sleep 30", Stdio::null(), Stdio::piped()));
        let error = decoder.abort(PipelineError::InvalidHeader { byte_len: u64::MAX });
        assert!(matches!(error, PipelineError::InvalidHeader { .. }));
    }

    #[test]
    fn test_encoder_failure_replaces_broken_pipe() {
        let encoder = EncoderProcess::from_child(shell("exit 1", Stdio::piped(), Stdio::null()));
        let broken_pipe = io::Error::new(io::ErrorKind::BrokenPipe, "encoder went away");
        let error = encoder.abort(PipelineError::Io(broken_pipe));
        assert!(matches!(error, PipelineError::CodecExit(status) if status.code() == Some(1)));
    }
}
