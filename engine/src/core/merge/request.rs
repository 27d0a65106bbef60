//! Merge request and media descriptor types

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::ffmpeg::MediaInfo;
use crate::core::{CoreError, CoreResult, Dimensions, TimeSec};

/// Target output resolution
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Resolution {
    /// 1280x720
    Hd720,
    /// 1920x1080
    #[default]
    FullHd1080,
    /// 3840x2160
    Uhd4k,
}

impl Resolution {
    /// Parse a resolution token.
    ///
    /// Matching is case-insensitive; anything unrecognized is 1080p.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "4k" => Self::Uhd4k,
            "720p" => Self::Hd720,
            _ => Self::FullHd1080,
        }
    }

    pub fn dimensions(self) -> Dimensions {
        match self {
            Self::Hd720 => Dimensions::new(1280, 720),
            Self::FullHd1080 => Dimensions::new(1920, 1080),
            Self::Uhd4k => Dimensions::new(3840, 2160),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hd720 => "720p",
            Self::FullHd1080 => "1080p",
            Self::Uhd4k => "4k",
        }
    }
}

impl From<String> for Resolution {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to merge videos, in concatenation order
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    pub input_files: Vec<PathBuf>,
    pub output_path: PathBuf,
    #[serde(default)]
    pub resolution: Resolution,
}

impl MergeRequest {
    pub fn new(
        input_files: impl IntoIterator<Item = impl Into<PathBuf>>,
        output_path: impl Into<PathBuf>,
        resolution: Resolution,
    ) -> Self {
        Self {
            input_files: input_files.into_iter().map(Into::into).collect(),
            output_path: output_path.into(),
            resolution,
        }
    }

    /// Checks the request before any engine work happens.
    pub fn validate(&self) -> CoreResult<()> {
        if self.input_files.len() < 2 {
            return Err(CoreError::Validation(
                "Please select at least two video files.".to_string(),
            ));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(CoreError::Validation("Output path is required.".to_string()));
        }
        Ok(())
    }
}

/// Default output file name: `merged_<unix-millis>.mp4` inside `dir`
pub fn default_output_path(dir: &Path) -> PathBuf {
    dir.join(format!(
        "merged_{}.mp4",
        chrono::Utc::now().timestamp_millis()
    ))
}

/// What the filter graph needs to know about one input
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MediaDescriptor {
    pub has_audio: bool,
    pub width: u32,
    pub height: u32,
    pub duration_secs: TimeSec,
}

impl MediaDescriptor {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }
}

impl From<&MediaInfo> for MediaDescriptor {
    /// Missing or zero frame sizes become 1920x1080.
    fn from(info: &MediaInfo) -> Self {
        let size = info
            .frame_size
            .filter(|size| size.width > 0 && size.height > 0)
            .unwrap_or(Dimensions::FULL_HD);

        Self {
            has_audio: info.has_audio(),
            width: size.width,
            height: size.height,
            duration_secs: info.duration_sec.max(0.0),
        }
    }
}

/// Best-effort summary of one video for callers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub has_audio: bool,
    pub width: u32,
    pub height: u32,
}

impl VideoInfo {
    /// Returned when a file cannot be analyzed: assume audio, 1920x1080.
    pub fn fallback() -> Self {
        Self {
            has_audio: true,
            width: Dimensions::FULL_HD.width,
            height: Dimensions::FULL_HD.height,
        }
    }
}

impl From<&MediaDescriptor> for VideoInfo {
    fn from(descriptor: &MediaDescriptor) -> Self {
        Self {
            has_audio: descriptor.has_audio,
            width: descriptor.width,
            height: descriptor.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media_info(video: Option<(u32, u32)>, audio_streams: usize, duration: f64) -> MediaInfo {
        MediaInfo {
            duration_sec: duration,
            frame_size: video.map(|(width, height)| Dimensions::new(width, height)),
            audio_stream_count: audio_streams,
        }
    }

    #[test]
    fn test_resolution_parse() {
        assert_eq!(Resolution::parse("4k"), Resolution::Uhd4k);
        assert_eq!(Resolution::parse("4K"), Resolution::Uhd4k);
        assert_eq!(Resolution::parse("720p"), Resolution::Hd720);
        assert_eq!(Resolution::parse("1080p"), Resolution::FullHd1080);
        assert_eq!(Resolution::parse("8k"), Resolution::FullHd1080);
        assert_eq!(Resolution::parse(""), Resolution::FullHd1080);
    }

    #[test]
    fn test_resolution_dimensions() {
        assert_eq!(Resolution::Uhd4k.dimensions(), Dimensions::new(3840, 2160));
        assert_eq!(Resolution::Hd720.dimensions(), Dimensions::new(1280, 720));
        assert_eq!(Resolution::FullHd1080.dimensions(), Dimensions::FULL_HD);
    }

    #[test]
    fn test_request_deserialization() {
        let json = r#"{
            "inputFiles": ["/v/a.mp4", "/v/b.mov"],
            "outputPath": "/v/out.mp4",
            "resolution": "4K"
        }"#;
        let request: MergeRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.input_files.len(), 2);
        assert_eq!(request.resolution, Resolution::Uhd4k);

        let json = r#"{ "inputFiles": [], "outputPath": "", "resolution": "huge" }"#;
        let request: MergeRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.resolution, Resolution::FullHd1080);

        let json = r#"{ "inputFiles": ["a", "b"], "outputPath": "o.mp4" }"#;
        let request: MergeRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.resolution, Resolution::FullHd1080);
    }

    #[test]
    fn test_resolution_serializes_as_token() {
        assert_eq!(serde_json::to_string(&Resolution::Hd720).unwrap(), r#""720p""#);
    }

    #[test]
    fn test_validate_requires_two_inputs() {
        let request = MergeRequest::new(["/v/only.mp4"], "/v/out.mp4", Resolution::default());
        let err = request.validate().unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let request = MergeRequest::new(Vec::<PathBuf>::new(), "/v/out.mp4", Resolution::default());
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_validate_requires_output() {
        let request = MergeRequest::new(["/v/a.mp4", "/v/b.mp4"], "", Resolution::default());
        assert!(matches!(
            request.validate(),
            Err(CoreError::Validation(_))
        ));

        let request = MergeRequest::new(["/v/a.mp4", "/v/b.mp4"], "/v/o.mp4", Resolution::default());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_default_output_path() {
        let path = default_output_path(Path::new("/tmp"));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("merged_"));
        assert!(name.ends_with(".mp4"));
        let millis = &name["merged_".len()..name.len() - ".mp4".len()];
        assert!(millis.parse::<i64>().is_ok());
    }

    #[test]
    fn test_descriptor_from_media_info() {
        let descriptor = MediaDescriptor::from(&media_info(Some((1280, 720)), 1, 12.5));
        assert!(descriptor.has_audio);
        assert_eq!(descriptor.dimensions(), Dimensions::new(1280, 720));
        assert_eq!(descriptor.duration_secs, 12.5);
    }

    #[test]
    fn test_descriptor_defaults_for_missing_metadata() {
        let descriptor = MediaDescriptor::from(&media_info(None, 0, 0.0));
        assert!(!descriptor.has_audio);
        assert_eq!(descriptor.dimensions(), Dimensions::FULL_HD);
        assert_eq!(descriptor.duration_secs, 0.0);

        let descriptor = MediaDescriptor::from(&media_info(Some((0, 720)), 0, 3.0));
        assert_eq!(descriptor.dimensions(), Dimensions::FULL_HD);
    }

    #[test]
    fn test_video_info_serialization() {
        let json = serde_json::to_value(VideoInfo::fallback()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "hasAudio": true, "width": 1920, "height": 1080 })
        );
    }
}
