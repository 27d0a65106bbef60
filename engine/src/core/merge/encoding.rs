//! Output encoding options
//!
//! The merge output is always H.264 High@4.2 + AAC in an MP4 with the moov
//! atom up front. Only the video encoder and its quality knobs vary.

use crate::core::ffmpeg::{HardwareBackend, VideoEncoder};

/// Fixed encoding policy around a selected video encoder
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputOptions {
    pub video_encoder: VideoEncoder,
}

impl OutputOptions {
    pub fn new(video_encoder: VideoEncoder) -> Self {
        Self { video_encoder }
    }

    /// Quality arguments specific to the encoder
    fn quality_args(&self) -> &'static [&'static str] {
        match self.video_encoder {
            VideoEncoder::Hardware(HardwareBackend::VideoToolbox) => {
                &["-q:v", "70", "-allow_sw", "1", "-realtime", "0"]
            }
            VideoEncoder::Hardware(HardwareBackend::Nvenc) => &["-preset", "p5", "-cq", "23"],
            VideoEncoder::Hardware(HardwareBackend::Qsv) => &["-global_quality", "23"],
            VideoEncoder::Hardware(HardwareBackend::Amf) => {
                &["-quality", "quality", "-rc", "cqp", "-qp_i", "23", "-qp_p", "23"]
            }
            VideoEncoder::Software => &["-preset", "medium", "-crf", "20"],
        }
    }

    /// Output arguments placed between `-map` and the output path
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["-c:v".into(), self.video_encoder.encoder_name().into()];
        args.extend(self.quality_args().iter().map(|s| s.to_string()));
        args.extend(
            [
                "-profile:v",
                "high",
                "-level",
                "4.2",
                "-threads",
                "0",
                "-c:a",
                "aac",
                "-b:a",
                "192k",
                "-ar",
                "44100",
                "-movflags",
                "+faststart",
                "-pix_fmt",
                "yuv420p",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_software_args() {
        let args = OutputOptions::new(VideoEncoder::Software).to_args();
        assert_eq!(value_after(&args, "-c:v"), Some("libx264"));
        assert_eq!(value_after(&args, "-crf"), Some("20"));
        assert_eq!(value_after(&args, "-preset"), Some("medium"));
        assert_eq!(value_after(&args, "-c:a"), Some("aac"));
        assert_eq!(value_after(&args, "-b:a"), Some("192k"));
        assert_eq!(value_after(&args, "-ar"), Some("44100"));
        assert_eq!(value_after(&args, "-movflags"), Some("+faststart"));
        assert_eq!(value_after(&args, "-pix_fmt"), Some("yuv420p"));
        assert_eq!(value_after(&args, "-profile:v"), Some("high"));
        assert_eq!(value_after(&args, "-level"), Some("4.2"));
        assert_eq!(value_after(&args, "-threads"), Some("0"));
    }

    #[test]
    fn test_videotoolbox_args() {
        let args =
            OutputOptions::new(VideoEncoder::Hardware(HardwareBackend::VideoToolbox)).to_args();
        assert_eq!(value_after(&args, "-c:v"), Some("h264_videotoolbox"));
        assert_eq!(value_after(&args, "-q:v"), Some("70"));
        assert_eq!(value_after(&args, "-allow_sw"), Some("1"));
        assert_eq!(value_after(&args, "-realtime"), Some("0"));
        assert!(value_after(&args, "-crf").is_none());
    }

    #[test]
    fn test_other_hardware_args() {
        let nvenc = OutputOptions::new(VideoEncoder::Hardware(HardwareBackend::Nvenc)).to_args();
        assert_eq!(value_after(&nvenc, "-cq"), Some("23"));
        assert_eq!(value_after(&nvenc, "-preset"), Some("p5"));

        let qsv = OutputOptions::new(VideoEncoder::Hardware(HardwareBackend::Qsv)).to_args();
        assert_eq!(value_after(&qsv, "-global_quality"), Some("23"));

        let amf = OutputOptions::new(VideoEncoder::Hardware(HardwareBackend::Amf)).to_args();
        assert_eq!(value_after(&amf, "-rc"), Some("cqp"));
        assert_eq!(value_after(&amf, "-c:v"), Some("h264_amf"));
    }
}
