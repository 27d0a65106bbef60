//! FFmpeg Integration Module
//!
//! Everything that talks to the external engine binaries:
//! - Discovery of `ffmpeg`/`ffprobe` (settings, environment, common install dirs, PATH)
//! - Encoder inventory and hardware encoder selection
//! - Media probing through `ffprobe`
//! - Spawning the long-running transcode process
//!
//! Discovery runs once; the resulting [`FFmpegInfo`] is injected into the
//! [`FFmpegRunner`] so tests can substitute fake binaries.

mod detection;
mod encoders;
mod runner;
mod state;

pub use detection::*;
pub use encoders::{
    parse_encoder_list, select_video_encoder, HardwareBackend, HwAccelPreference, VideoEncoder,
};
pub use runner::{FFmpegRunner, MediaInfo};
pub use state::{create_ffmpeg_state, FFmpegState, SharedFFmpegState};

/// FFmpeg-related error types
#[derive(Debug, thiserror::Error)]
pub enum FFmpegError {
    #[error("FFmpeg not found. Please install FFmpeg or set its path in the settings.")]
    NotFound,

    /// Carries the engine's stderr verbatim.
    #[error("{0}")]
    ExecutionFailed(String),

    #[error("Invalid input file: {0}")]
    InvalidInput(String),

    #[error("FFprobe error: {0}")]
    ProbeError(String),

    #[error("Process error: {0}")]
    ProcessError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Timeout: operation took too long")]
    Timeout,
}

pub type FFmpegResult<T> = Result<T, FFmpegError>;
