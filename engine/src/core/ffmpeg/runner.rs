//! FFmpeg Runner Module
//!
//! Runs the engine binaries found by detection: `ffprobe` for media
//! information and `ffmpeg` for the long-running transcode.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use super::{FFmpegError, FFmpegInfo, FFmpegResult};
use crate::core::process::tokio_command;
use crate::core::Dimensions;

/// Default per-file probe timeout
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// What a merge needs from one FFprobe run
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MediaInfo {
    /// Container duration in seconds, 0 when unknown
    pub duration_sec: f64,
    /// Frame size of the first video stream
    pub frame_size: Option<Dimensions>,
    /// Number of audio streams in the container
    pub audio_stream_count: usize,
}

impl MediaInfo {
    pub fn has_audio(&self) -> bool {
        self.audio_stream_count > 0
    }
}

/// FFmpeg Runner for probing media and spawning transcodes
#[derive(Clone)]
pub struct FFmpegRunner {
    info: Arc<FFmpegInfo>,
    probe_timeout: Duration,
}

impl FFmpegRunner {
    /// Create a new FFmpegRunner from detected FFmpeg installation
    pub fn new(info: FFmpegInfo) -> Self {
        Self {
            info: Arc::new(info),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Get the FFmpeg info
    pub fn info(&self) -> &FFmpegInfo {
        &self.info
    }

    /// Probe media file to get information
    pub async fn probe(&self, input: &Path) -> FFmpegResult<MediaInfo> {
        if !input.exists() {
            return Err(FFmpegError::InvalidInput(format!(
                "Input file does not exist: {}",
                input.display()
            )));
        }

        let mut cmd = tokio_command(&self.info.ffprobe_path);
        cmd.args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(input);

        let output = tokio::time::timeout(self.probe_timeout, cmd.output())
            .await
            .map_err(|_| FFmpegError::Timeout)?
            .map_err(FFmpegError::ProcessError)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            return Err(FFmpegError::ProbeError(if stderr.is_empty() {
                format!("ffprobe exited with {}", output.status)
            } else {
                stderr.to_string()
            }));
        }

        parse_probe_output(&String::from_utf8_lossy(&output.stdout))
    }

    /// Spawn ffmpeg with the given arguments.
    ///
    /// Stdout and stderr are piped for the caller to drain; the child is
    /// killed if the returned handle is dropped.
    pub fn spawn_ffmpeg(&self, args: &[String]) -> FFmpegResult<tokio::process::Child> {
        let mut cmd = tokio_command(&self.info.ffmpeg_path);
        cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd.spawn().map_err(FFmpegError::ProcessError)
    }
}

#[derive(serde::Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(serde::Deserialize)]
struct ProbeFormat {
    /// Decimal string, or "N/A"
    duration: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Parse FFprobe JSON output
pub fn parse_probe_output(json_str: &str) -> FFmpegResult<MediaInfo> {
    let output: ProbeOutput = serde_json::from_str(json_str)
        .map_err(|e| FFmpegError::ParseError(format!("Failed to parse FFprobe output: {}", e)))?;

    let format = output
        .format
        .ok_or_else(|| FFmpegError::ParseError("Missing format info".to_string()))?;

    let duration_sec = format
        .duration
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0);

    let frame_size = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .map(|s| Dimensions::new(s.width.unwrap_or(0), s.height.unwrap_or(0)));

    let audio_stream_count = output
        .streams
        .iter()
        .filter(|s| s.codec_type.as_deref() == Some("audio"))
        .count();

    Ok(MediaInfo {
        duration_sec,
        frame_size,
        audio_stream_count,
    })
}
