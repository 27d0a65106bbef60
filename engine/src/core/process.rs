//! Child process construction for engine binaries.
//!
//! Every ffmpeg/ffprobe invocation goes through these helpers so they share
//! the same stdio setup: no inherited stdin, and on Windows no console window
//! popping up when the host is a GUI application.

use std::ffi::OsStr;
use std::process::Stdio;

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Apply platform-specific flags to a std process command.
pub fn configure_std_command(cmd: &mut std::process::Command) {
    cmd.stdin(Stdio::null());
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
}

/// Apply platform-specific flags to a tokio process command.
///
/// The child is killed if its handle is dropped, so an abandoned job never
/// leaves an encoder running.
pub fn configure_tokio_command(cmd: &mut tokio::process::Command) {
    cmd.stdin(Stdio::null()).kill_on_drop(true);
    #[cfg(target_os = "windows")]
    {
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
}

/// Blocking command for short engine queries (version, encoder list).
pub fn std_command(program: impl AsRef<OsStr>) -> std::process::Command {
    let mut cmd = std::process::Command::new(program);
    configure_std_command(&mut cmd);
    cmd
}

/// Async command for probes and transcodes.
pub fn tokio_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    configure_tokio_command(&mut cmd);
    cmd
}
