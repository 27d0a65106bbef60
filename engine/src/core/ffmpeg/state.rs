//! FFmpeg shared state
//!
//! Holds the runner produced by detection so every merge and probe in the
//! process reuses one discovered engine.

use std::sync::Arc;

use tokio::sync::RwLock;

use super::{detect_ffmpeg, FFmpegError, FFmpegInfo, FFmpegRunner};
use crate::core::settings::EngineSettings;

/// Process-wide FFmpeg runner state.
///
/// Initialized once at startup. When detection fails the state stays empty
/// and callers report the engine as unavailable on first use.
#[derive(Default)]
pub struct FFmpegState {
    runner: Option<FFmpegRunner>,
}

impl FFmpegState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize FFmpeg by detecting the installation.
    pub fn initialize(&mut self, settings: &EngineSettings) -> Result<(), FFmpegError> {
        let info = detect_ffmpeg(settings)?;
        self.runner = Some(FFmpegRunner::new(info).with_probe_timeout(settings.probe_timeout()));
        Ok(())
    }

    /// Install an already-known engine.
    pub fn set_info(&mut self, info: FFmpegInfo) {
        self.runner = Some(FFmpegRunner::new(info));
    }

    /// Get the FFmpeg runner.
    pub fn runner(&self) -> Option<&FFmpegRunner> {
        self.runner.as_ref()
    }

    /// Get FFmpeg info.
    pub fn info(&self) -> Option<&FFmpegInfo> {
        self.runner.as_ref().map(FFmpegRunner::info)
    }

    /// Check if FFmpeg is available.
    pub fn is_available(&self) -> bool {
        self.runner.is_some()
    }
}

/// Shared FFmpeg state for the async runtime.
pub type SharedFFmpegState = Arc<RwLock<FFmpegState>>;

/// Create a new shared FFmpeg state.
pub fn create_ffmpeg_state() -> SharedFFmpegState {
    Arc::new(RwLock::new(FFmpegState::new()))
}
