//! vidmerge Engine Library
//!
//! Merges independent video files into one output through FFmpeg.
//! This library contains engine discovery, media probing, filter graph
//! construction, progress estimation and the transcode supervisor.
//!
//! Front-ends (desktop shells, the CLI) talk to the engine through the
//! `vidmerge-core` facade crate; nothing in here knows about windows or dialogs.

pub mod core;

use std::path::Path;
use std::sync::OnceLock;

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Install the global tracing subscriber.
///
/// Logs go to stderr, plus a daily rolling `vidmerge.log` when `log_dir` is
/// given. `RUST_LOG` overrides the default `info` level. Calling this more
/// than once is harmless: later calls leave the first subscriber in place.
pub fn init_logging(log_dir: Option<&Path>, verbose: bool) {
    use tracing_subscriber::prelude::*;

    let default_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions));

    let file_layer = log_dir.and_then(|dir| {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Failed to create log directory {}: {}", dir.display(), e);
            return None;
        }

        let file_appender = tracing_appender::rolling::daily(dir, "vidmerge.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let _ = LOG_GUARD.set(guard);

        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
    });

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer);

    // Avoid panics if already initialized (tests, embedding hosts).
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_logging_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = temp_dir.path().join("logs");

        init_logging(Some(&log_dir), false);
        init_logging(None, true);

        assert!(log_dir.exists());
    }
}
