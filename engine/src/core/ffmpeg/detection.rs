//! FFmpeg Detection Module
//!
//! Locates the ffmpeg/ffprobe binaries, reads the engine version and encoder
//! inventory, and settles which video encoder merges will use.
//!
//! Lookup order for each binary:
//! 1. Explicit path from settings
//! 2. `VIDMERGE_FFMPEG` / `VIDMERGE_FFPROBE` environment overrides
//! 3. Common install directories for the platform
//! 4. `PATH` search

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::{
    parse_encoder_list, select_video_encoder, FFmpegError, FFmpegResult, HardwareBackend,
    VideoEncoder,
};
use crate::core::process::std_command;
use crate::core::settings::EngineSettings;

/// Environment override for the ffmpeg binary
pub const FFMPEG_ENV: &str = "VIDMERGE_FFMPEG";
/// Environment override for the ffprobe binary
pub const FFPROBE_ENV: &str = "VIDMERGE_FFPROBE";

/// Information about the detected FFmpeg installation
#[derive(Debug, Clone)]
pub struct FFmpegInfo {
    /// Path to ffmpeg binary
    pub ffmpeg_path: PathBuf,
    /// Path to ffprobe binary
    pub ffprobe_path: PathBuf,
    /// FFmpeg version string
    pub version: String,
    /// Encoders compiled into this ffmpeg
    pub encoders: BTreeSet<String>,
    /// Video encoder merges will use
    pub video_encoder: VideoEncoder,
}

impl FFmpegInfo {
    /// Info for known binaries, skipping version and encoder queries.
    ///
    /// Used when the caller already trusts the paths (substitute engines in
    /// tests, embedding hosts that ship their own build).
    pub fn from_paths(ffmpeg_path: impl Into<PathBuf>, ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
            version: "unknown".to_string(),
            encoders: BTreeSet::new(),
            video_encoder: VideoEncoder::Software,
        }
    }

    pub fn is_hardware_accelerated(&self) -> bool {
        self.video_encoder.is_hardware()
    }
}

/// Detect FFmpeg according to the engine settings.
///
/// Returns `FFmpegError::NotFound` when either binary cannot be located.
pub fn detect_ffmpeg(settings: &EngineSettings) -> FFmpegResult<FFmpegInfo> {
    let ffmpeg_path = resolve_binary(
        "ffmpeg",
        settings.ffmpeg_path.as_deref(),
        std::env::var_os(FFMPEG_ENV),
    )?;
    let ffprobe_path = resolve_binary(
        "ffprobe",
        settings.ffprobe_path.as_deref(),
        std::env::var_os(FFPROBE_ENV),
    )?;

    let version = get_ffmpeg_version(&ffmpeg_path)?;

    let encoders = list_encoders(&ffmpeg_path).unwrap_or_else(|e| {
        tracing::warn!("Could not list FFmpeg encoders, using software encoding: {}", e);
        BTreeSet::new()
    });

    let video_encoder = select_video_encoder(settings.hw_accel_preference(), &encoders, |backend| {
        smoke_test_encoder(&ffmpeg_path, backend)
    });

    tracing::info!(
        "Using FFmpeg {} at {} (video encoder: {})",
        version,
        ffmpeg_path.display(),
        video_encoder
    );

    Ok(FFmpegInfo {
        ffmpeg_path,
        ffprobe_path,
        version,
        encoders,
        video_encoder,
    })
}

/// Resolve one engine binary following the lookup order.
pub fn resolve_binary(
    name: &str,
    explicit: Option<&Path>,
    env_override: Option<OsString>,
) -> FFmpegResult<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        tracing::warn!(
            "Configured {} path {} does not exist, searching elsewhere",
            name,
            path.display()
        );
    }

    if let Some(path) = env_override.map(PathBuf::from) {
        if path.is_file() {
            return Ok(path);
        }
        tracing::warn!(
            "{} override {} does not exist, searching elsewhere",
            name,
            path.display()
        );
    }

    let binary_name = binary_file_name(name);
    for dir in get_common_ffmpeg_paths() {
        let candidate = dir.join(&binary_name);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    which::which(name).map_err(|_| FFmpegError::NotFound)
}

fn binary_file_name(name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

/// Get common FFmpeg installation paths for the current platform
pub fn get_common_ffmpeg_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(target_os = "windows")]
    {
        paths.push(PathBuf::from(r"C:\ffmpeg\bin"));
        paths.push(PathBuf::from(r"C:\Program Files\ffmpeg\bin"));
        paths.push(PathBuf::from(r"C:\Program Files (x86)\ffmpeg\bin"));

        // Chocolatey installation
        if let Ok(programdata) = std::env::var("ProgramData") {
            paths.push(PathBuf::from(programdata).join("chocolatey").join("bin"));
        }

        // Scoop installation
        if let Ok(userprofile) = std::env::var("USERPROFILE") {
            paths.push(PathBuf::from(userprofile).join("scoop").join("shims"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        // Homebrew paths
        paths.push(PathBuf::from("/opt/homebrew/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/opt/local/bin")); // MacPorts
    }

    #[cfg(target_os = "linux")]
    {
        paths.push(PathBuf::from("/usr/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/snap/bin"));
    }

    paths
}

/// Get FFmpeg version string
pub fn get_ffmpeg_version(ffmpeg_path: &Path) -> FFmpegResult<String> {
    let output = std_command(ffmpeg_path)
        .arg("-version")
        .output()
        .map_err(FFmpegError::ProcessError)?;

    if !output.status.success() {
        return Err(FFmpegError::ExecutionFailed(
            "Failed to get FFmpeg version".to_string(),
        ));
    }

    parse_version_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parse the version from `ffmpeg -version` output.
///
/// The first line reads `ffmpeg version X ...`; when it doesn't, the whole
/// first line is returned.
pub fn parse_version_output(output: &str) -> FFmpegResult<String> {
    let first_line = output
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .ok_or_else(|| FFmpegError::ParseError("Could not parse FFmpeg version".to_string()))?;

    if let Some(version) = first_line
        .strip_prefix("ffmpeg version ")
        .and_then(|rest| rest.split_whitespace().next())
    {
        return Ok(version.to_string());
    }

    Ok(first_line.to_string())
}

/// List the encoders compiled into this ffmpeg
pub fn list_encoders(ffmpeg_path: &Path) -> FFmpegResult<BTreeSet<String>> {
    let output = std_command(ffmpeg_path)
        .args(["-hide_banner", "-encoders"])
        .output()
        .map_err(FFmpegError::ProcessError)?;

    if !output.status.success() {
        return Err(FFmpegError::ExecutionFailed(
            "Failed to list FFmpeg encoders".to_string(),
        ));
    }

    Ok(parse_encoder_list(&String::from_utf8_lossy(&output.stdout)))
}

/// Encode a tenth of a second of test pattern to the null muxer.
///
/// Listing an encoder only proves it was compiled in; this proves the driver
/// and device are actually there.
pub fn smoke_test_encoder(ffmpeg_path: &Path, backend: HardwareBackend) -> bool {
    let result = std_command(ffmpeg_path)
        .args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "lavfi",
            "-i",
            "testsrc2=duration=0.1:size=640x360:rate=30",
            "-c:v",
            backend.encoder_name(),
            "-pix_fmt",
            "yuv420p",
            "-f",
            "null",
            "-",
        ])
        .output();

    match result {
        Ok(output) if output.status.success() => true,
        Ok(output) => {
            tracing::debug!(
                "Smoke encode with {} failed: {}",
                backend.encoder_name(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            false
        }
        Err(e) => {
            tracing::debug!("Smoke encode with {} could not run: {}", backend.encoder_name(), e);
            false
        }
    }
}

/// Validate that FFmpeg binaries are functional
pub fn validate_ffmpeg(info: &FFmpegInfo) -> FFmpegResult<()> {
    for (path, label) in [(&info.ffmpeg_path, "FFmpeg"), (&info.ffprobe_path, "FFprobe")] {
        let output = std_command(path)
            .arg("-version")
            .output()
            .map_err(FFmpegError::ProcessError)?;

        if !output.status.success() {
            return Err(FFmpegError::ExecutionFailed(format!(
                "{} binary is not functional",
                label
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_output() {
        let output = "ffmpeg version 6.1.1 Copyright (c) 2000-2023 the FFmpeg developers\n\
                      built with Apple clang version 15.0.0";
        assert_eq!(parse_version_output(output).unwrap(), "6.1.1");
    }

    #[test]
    fn test_parse_version_output_unexpected_format() {
        let output = "ffmpeg-custom build n7.0\nmore";
        assert_eq!(
            parse_version_output(output).unwrap(),
            "ffmpeg-custom build n7.0"
        );
        assert!(matches!(
            parse_version_output(""),
            Err(FFmpegError::ParseError(_))
        ));
    }

    #[test]
    fn test_from_paths_defaults_to_software() {
        let info = FFmpegInfo::from_paths("/bin/ffmpeg", "/bin/ffprobe");
        assert_eq!(info.video_encoder, VideoEncoder::Software);
        assert!(!info.is_hardware_accelerated());
        assert!(info.encoders.is_empty());
    }

    #[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
    #[test]
    fn test_common_paths_not_empty() {
        let paths = get_common_ffmpeg_paths();
        assert!(!paths.is_empty());
    }

    #[cfg(unix)]
    mod with_fake_engine {
        use super::*;
        use crate::core::test_support::write_script;
        use tempfile::TempDir;

        const FAKE_FFMPEG: &str = r#"
case "$1" in
  -version)
    echo "ffmpeg version 6.1.1 Copyright (c) 2000-2023 the FFmpeg developers"
    exit 0
    ;;
esac
if [ "$2" = "-encoders" ]; then
  echo "Encoders:"
  echo " V..... = Video"
  echo " ------"
  echo " V....D libx264              libx264 H.264"
  echo " V....D h264_nvenc           NVIDIA NVENC H.264 encoder"
  echo " A....D aac                  AAC"
  exit 0
fi
exit 0
"#;

        fn fake_settings(dir: &TempDir, smoke_ok: bool) -> EngineSettings {
            let body = if smoke_ok {
                FAKE_FFMPEG.to_string()
            } else {
                FAKE_FFMPEG.replacen("fi\nexit 0", "fi\necho 'No NVENC capable devices found' >&2\nexit 1", 1)
            };
            let ffmpeg = write_script(dir.path(), "ffmpeg", &body);
            let ffprobe = write_script(dir.path(), "ffprobe", "exit 0\n");
            EngineSettings {
                ffmpeg_path: Some(ffmpeg),
                ffprobe_path: Some(ffprobe),
                ..Default::default()
            }
        }

        #[test]
        fn test_explicit_path_wins() {
            let temp_dir = TempDir::new().unwrap();
            let explicit = write_script(temp_dir.path(), "ffprobe", "exit 0\n");
            let other = write_script(temp_dir.path(), "other", "exit 0\n");

            let resolved =
                resolve_binary("ffprobe", Some(&explicit), Some(other.into_os_string())).unwrap();
            assert_eq!(resolved, explicit);
        }

        #[test]
        fn test_env_override_used_when_explicit_missing() {
            let temp_dir = TempDir::new().unwrap();
            let from_env = write_script(temp_dir.path(), "ffprobe-env", "exit 0\n");
            let missing = temp_dir.path().join("missing");

            let resolved = resolve_binary(
                "ffprobe",
                Some(&missing),
                Some(from_env.clone().into_os_string()),
            )
            .unwrap();
            assert_eq!(resolved, from_env);
        }

        #[test]
        fn test_unresolvable_binary_is_not_found() {
            let result = resolve_binary("vidmerge-no-such-engine-binary", None, None);
            assert!(matches!(result, Err(FFmpegError::NotFound)));
        }

        #[test]
        fn test_detect_with_hw_accel_off() {
            let temp_dir = TempDir::new().unwrap();
            let mut settings = fake_settings(&temp_dir, true);
            settings.hardware_acceleration = "off".to_string();

            let info = detect_ffmpeg(&settings).unwrap();
            assert_eq!(info.version, "6.1.1");
            assert!(info.encoders.contains("h264_nvenc"));
            assert_eq!(info.video_encoder, VideoEncoder::Software);
            validate_ffmpeg(&info).unwrap();
        }

        #[test]
        fn test_detect_selects_working_hardware_encoder() {
            let temp_dir = TempDir::new().unwrap();
            let mut settings = fake_settings(&temp_dir, true);
            settings.hardware_acceleration = "nvenc".to_string();

            let info = detect_ffmpeg(&settings).unwrap();
            assert_eq!(
                info.video_encoder,
                VideoEncoder::Hardware(HardwareBackend::Nvenc)
            );
            assert!(info.is_hardware_accelerated());
        }

        #[test]
        fn test_detect_falls_back_when_smoke_encode_fails() {
            let temp_dir = TempDir::new().unwrap();
            let mut settings = fake_settings(&temp_dir, false);
            settings.hardware_acceleration = "nvenc".to_string();

            let info = detect_ffmpeg(&settings).unwrap();
            assert_eq!(info.video_encoder, VideoEncoder::Software);
        }
    }
}
