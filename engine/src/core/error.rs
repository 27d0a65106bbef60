//! vidmerge Error Definitions
//!
//! Defines the error taxonomy surfaced by a merge job.

use thiserror::Error;

use super::ffmpeg::FFmpegError;

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Request Errors
    // =========================================================================
    #[error("{0}")]
    Validation(String),

    // =========================================================================
    // Probe Errors
    // =========================================================================
    #[error("Video analysis failed: {path}: {message}")]
    Probe { path: String, message: String },

    // =========================================================================
    // Engine Errors
    // =========================================================================
    /// The engine ran and failed. Carries FFmpeg's own diagnostics verbatim.
    #[error("{0}")]
    Engine(String),

    #[error("FFmpeg not found. Please install FFmpeg or set its path in the settings.")]
    EngineUnavailable,

    #[error("Merge cancelled")]
    Cancelled,

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Convenience constructor for [`CoreError::Probe`].
    pub fn probe(path: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::Probe {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Convert to the rejection string handed to front-ends
    pub fn to_ipc_error(&self) -> String {
        self.to_string()
    }

    /// Whether this error was raised before any engine process was spawned.
    pub fn is_pre_spawn(&self) -> bool {
        matches!(
            self,
            CoreError::Validation(_) | CoreError::Probe { .. } | CoreError::EngineUnavailable
        )
    }
}

impl From<FFmpegError> for CoreError {
    fn from(err: FFmpegError) -> Self {
        match err {
            FFmpegError::NotFound => CoreError::EngineUnavailable,
            FFmpegError::ExecutionFailed(stderr) => CoreError::Engine(stderr),
            FFmpegError::ProcessError(e) => CoreError::Engine(format!("Failed to run FFmpeg: {e}")),
            FFmpegError::InvalidInput(message) => CoreError::Validation(message),
            other => CoreError::Internal(other.to_string()),
        }
    }
}
