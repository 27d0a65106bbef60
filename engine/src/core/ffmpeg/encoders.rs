//! Encoder Inventory Module
//!
//! Parses `ffmpeg -encoders` and picks the H.264 encoder a merge will use.
//! Hardware encoders are preferred when the platform exposes one that
//! actually works; otherwise the software encoder is used.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Hardware H.264 encoder backends we know how to drive
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareBackend {
    /// Apple VideoToolbox (macOS)
    VideoToolbox,
    /// NVIDIA NVENC
    Nvenc,
    /// Intel Quick Sync
    Qsv,
    /// AMD AMF
    Amf,
}

impl HardwareBackend {
    /// FFmpeg encoder name for this backend
    pub fn encoder_name(self) -> &'static str {
        match self {
            Self::VideoToolbox => "h264_videotoolbox",
            Self::Nvenc => "h264_nvenc",
            Self::Qsv => "h264_qsv",
            Self::Amf => "h264_amf",
        }
    }

    /// Backends worth trying on the current platform, most preferred first
    pub fn platform_candidates() -> &'static [HardwareBackend] {
        PLATFORM_CANDIDATES
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "videotoolbox" => Some(Self::VideoToolbox),
            "nvenc" => Some(Self::Nvenc),
            "qsv" => Some(Self::Qsv),
            "amf" => Some(Self::Amf),
            _ => None,
        }
    }
}

#[cfg(target_os = "macos")]
const PLATFORM_CANDIDATES: &[HardwareBackend] = &[HardwareBackend::VideoToolbox];

#[cfg(target_os = "windows")]
const PLATFORM_CANDIDATES: &[HardwareBackend] = &[
    HardwareBackend::Nvenc,
    HardwareBackend::Qsv,
    HardwareBackend::Amf,
];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const PLATFORM_CANDIDATES: &[HardwareBackend] = &[HardwareBackend::Nvenc, HardwareBackend::Qsv];

/// Video encoder chosen for merge output
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "backend", rename_all = "camelCase")]
pub enum VideoEncoder {
    Hardware(HardwareBackend),
    /// libx264
    #[default]
    Software,
}

impl VideoEncoder {
    pub const SOFTWARE_ENCODER: &'static str = "libx264";

    /// FFmpeg encoder name
    pub fn encoder_name(self) -> &'static str {
        match self {
            Self::Hardware(backend) => backend.encoder_name(),
            Self::Software => Self::SOFTWARE_ENCODER,
        }
    }

    pub fn is_hardware(self) -> bool {
        matches!(self, Self::Hardware(_))
    }
}

impl fmt::Display for VideoEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encoder_name())
    }
}

/// User preference for hardware encoding
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HwAccelPreference {
    /// Try the platform's backends in order
    #[default]
    Auto,
    /// Always use the software encoder
    Off,
    /// Try only this backend
    Only(HardwareBackend),
}

impl HwAccelPreference {
    /// Parses a settings value; unknown values mean `Auto`.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("off") || value.eq_ignore_ascii_case("none") {
            return Self::Off;
        }
        HardwareBackend::parse(value)
            .map(Self::Only)
            .unwrap_or(Self::Auto)
    }

    fn candidates(self) -> Vec<HardwareBackend> {
        match self {
            Self::Auto => HardwareBackend::platform_candidates().to_vec(),
            Self::Off => Vec::new(),
            Self::Only(backend) => vec![backend],
        }
    }
}

/// Parse `ffmpeg -encoders` output into a set of encoder names.
///
/// Encoder lines look like ` V....D h264_videotoolbox    VideoToolbox H.264 Encoder`.
/// The header legend (` V..... = Video`) and the `------` separator are skipped.
pub fn parse_encoder_list(output: &str) -> BTreeSet<String> {
    let mut encoders = BTreeSet::new();
    let mut in_list = false;

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("------") {
            in_list = true;
            continue;
        }
        if !in_list {
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        let (Some(flags), Some(name)) = (parts.next(), parts.next()) else {
            continue;
        };
        if flags.len() == 6 && flags.chars().next().is_some_and(|c| "VAS".contains(c)) {
            encoders.insert(name.to_string());
        }
    }

    encoders
}

/// Pick the video encoder for merges.
///
/// A hardware backend is chosen only if FFmpeg lists its encoder and
/// `is_usable` confirms it can encode on this machine (drivers present,
/// device available). Listed-but-broken backends fall through to the next
/// candidate and finally to the software encoder.
pub fn select_video_encoder(
    preference: HwAccelPreference,
    available: &BTreeSet<String>,
    mut is_usable: impl FnMut(HardwareBackend) -> bool,
) -> VideoEncoder {
    for backend in preference.candidates() {
        if !available.contains(backend.encoder_name()) {
            tracing::debug!("Encoder {} not compiled into FFmpeg", backend.encoder_name());
            continue;
        }
        if is_usable(backend) {
            return VideoEncoder::Hardware(backend);
        }
        tracing::warn!(
            "Hardware encoder {} is listed but not usable, trying next option",
            backend.encoder_name()
        );
    }

    VideoEncoder::Software
}
