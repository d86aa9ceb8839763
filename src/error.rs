use std::io;
use std::process::ExitStatus;

use thiserror::Error;

/// Every failure the inject/extract pipelines can report.
///
/// All of them are fatal: nothing is retried and no partial output is salvaged.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Read, write or pipe failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The external codec could not be started.
    #[error("unable to start codec process `{program}`: {source}")]
    CodecSpawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The external codec ran but exited with an error.
    #[error("codec process exited with {0}")]
    CodecExit(ExitStatus),

    #[error("invalid frame geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// A frame index was delivered twice, or after the cursor moved past it.
    #[error("frame {index} was delivered more than once")]
    DuplicateFrame { index: u64 },

    /// The stream closed before every expected frame was emitted.
    #[error("stream closed at frame {cursor} while {expected} frames were expected ({buffered} still buffered)")]
    MissingFrames {
        cursor: u64,
        expected: u64,
        buffered: usize,
    },

    /// The decoded stream ended before frame 0 (the length header) arrived.
    #[error("no frame carrying the length header was decoded")]
    MissingHeader,

    /// Frame 0 decoded to a length no file can have.
    #[error("length header announces {byte_len} bytes, more than a file can hold")]
    InvalidHeader { byte_len: u64 },

    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
