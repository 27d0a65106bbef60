//! Transcode Supervisor
//!
//! Owns the FFmpeg child process for one merge job. Stdout carries
//! `-progress` blocks and stderr carries diagnostics; both are drained
//! concurrently while the supervisor waits for the process to exit or for
//! the job to be cancelled.

use std::path::PathBuf;
use std::process::ExitStatus;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use super::progress::{Percent, ProgressParser, ProgressTracker};
use crate::core::ffmpeg::FFmpegRunner;
use crate::core::{CoreError, CoreResult, JobId, TimeSec};

// =============================================================================
// Events
// =============================================================================

/// Non-terminal events of a merge job, in emission order
#[derive(Clone, Debug, PartialEq)]
pub enum MergeEvent {
    /// The engine was spawned with this command line
    Started { command: String },
    /// Completion moved forward
    Progress { percent: Percent },
}

/// Sending side of the job event channel
pub type MergeEventSender = mpsc::UnboundedSender<MergeEvent>;

// =============================================================================
// Cancellation
// =============================================================================

/// Handle to a running job for cancellation
#[derive(Debug)]
pub struct JobHandle {
    /// Job ID
    pub id: JobId,
    /// Cancel sender
    cancel_tx: Option<oneshot::Sender<()>>,
}

impl JobHandle {
    /// Cancels the job. Returns false if the job already finished.
    pub fn cancel(mut self) -> bool {
        if let Some(tx) = self.cancel_tx.take() {
            tx.send(()).is_ok()
        } else {
            false
        }
    }
}

/// Job side of a [`JobHandle`]
#[derive(Debug)]
pub struct CancelToken {
    cancel_rx: oneshot::Receiver<()>,
}

impl CancelToken {
    /// A token nobody can trigger
    pub fn never() -> Self {
        let (_tx, cancel_rx) = oneshot::channel();
        Self { cancel_rx }
    }

    /// Whether `cancel` has already been called, without waiting.
    pub(crate) fn is_cancelled(&mut self) -> bool {
        self.cancel_rx.try_recv().is_ok()
    }

    /// Resolves when the matching handle calls `cancel`.
    ///
    /// Dropping the handle without cancelling leaves this pending forever.
    pub(crate) async fn cancelled(&mut self) {
        if (&mut self.cancel_rx).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Create a linked handle/token pair for one job
pub fn cancellation(job_id: &str) -> (JobHandle, CancelToken) {
    let (cancel_tx, cancel_rx) = oneshot::channel();
    (
        JobHandle {
            id: job_id.to_string(),
            cancel_tx: Some(cancel_tx),
        },
        CancelToken { cancel_rx },
    )
}

// =============================================================================
// Supervisor
// =============================================================================

/// Everything needed to run one transcode
#[derive(Clone, Debug)]
pub struct TranscodeJob {
    pub job_id: JobId,
    /// Full ffmpeg argument list, output path last
    pub args: Vec<String>,
    pub output_path: PathBuf,
    /// Buffered total duration used for progress
    pub total_duration: TimeSec,
}

/// Spawns and watches the engine process for a job
#[derive(Clone)]
pub struct TranscodeSupervisor {
    runner: FFmpegRunner,
}

impl TranscodeSupervisor {
    pub fn new(runner: FFmpegRunner) -> Self {
        Self { runner }
    }

    /// Run the job to completion.
    ///
    /// Emits `Started`, then progress, then a final `Progress(100.0)` on
    /// success. On failure or cancellation no terminal progress is sent.
    pub async fn run(
        &self,
        job: TranscodeJob,
        events: MergeEventSender,
        mut cancel: CancelToken,
    ) -> CoreResult<PathBuf> {
        if cancel.is_cancelled() {
            tracing::info!("Merge job {} cancelled before FFmpeg started", job.job_id);
            return Err(CoreError::Cancelled);
        }

        let mut child = self.runner.spawn_ffmpeg(&job.args)?;

        let command = render_command(&self.runner.info().ffmpeg_path, &job.args);
        tracing::info!("FFmpeg command: {}", command);
        let _ = events.send(MergeEvent::Started { command });

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CoreError::Internal("FFmpeg stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| CoreError::Internal("FFmpeg stderr was not captured".to_string()))?;

        let tracker = ProgressTracker::new(job.total_duration);
        let progress_task = tokio::spawn(
            forward_progress(stdout, tracker, events.clone()).in_current_span(),
        );
        let stderr_task = tokio::spawn(collect_stderr(stderr).in_current_span());

        let exit = tokio::select! {
            status = child.wait() => Some(status),
            _ = cancel.cancelled() => None,
        };

        let Some(status) = exit else {
            progress_task.abort();
            stderr_task.abort();
            if let Err(e) = child.kill().await {
                tracing::warn!("Failed to kill FFmpeg for job {}: {}", job.job_id, e);
            }
            tracing::info!("Merge job {} cancelled", job.job_id);
            return Err(CoreError::Cancelled);
        };

        let status = status.map_err(|e| CoreError::Engine(format!("Failed to run FFmpeg: {e}")))?;
        let tracker = progress_task
            .await
            .map_err(|e| CoreError::Internal(format!("Progress reader failed: {e}")))?;
        let stderr = stderr_task
            .await
            .map_err(|e| CoreError::Internal(format!("Stderr reader failed: {e}")))?;

        if !status.success() {
            tracing::error!("FFmpeg failed for job {}: {}", job.job_id, stderr);
            return Err(CoreError::Engine(failure_message(status, &stderr)));
        }

        let _ = events.send(MergeEvent::Progress {
            percent: tracker.finalize(),
        });
        tracing::info!("Merge job {} completed: {}", job.job_id, job.output_path.display());
        Ok(job.output_path)
    }
}

async fn forward_progress(
    stdout: impl AsyncRead + Unpin,
    mut tracker: ProgressTracker,
    events: MergeEventSender,
) -> ProgressTracker {
    let mut lines = BufReader::new(stdout).lines();
    let mut parser = ProgressParser::new();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let Some(block) = parser.push_line(&line) else {
                    continue;
                };
                let update = block.update(tracker.total());
                if let Some(percent) = update.and_then(|u| tracker.observe(u)) {
                    tracing::debug!("Merge progress: {}%", percent);
                    let _ = events.send(MergeEvent::Progress { percent });
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Failed to read FFmpeg progress: {}", e);
                break;
            }
        }
    }

    tracker
}

async fn collect_stderr(stderr: impl AsyncRead + Unpin) -> String {
    let mut lines = BufReader::new(stderr).lines();
    let mut collected = Vec::new();

    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(target: "vidmerge::ffmpeg", "{}", line);
        collected.push(line);
    }

    collected.join("\n")
}

fn failure_message(status: ExitStatus, stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("FFmpeg exited with {}", status)
    } else {
        stderr.to_string()
    }
}

/// Shell-like rendering of the command for diagnostics
fn render_command(program: &std::path::Path, args: &[String]) -> String {
    std::iter::once(program.to_string_lossy().into_owned())
        .chain(args.iter().cloned())
        .map(|arg| {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                format!("'{}'", arg)
            } else {
                arg
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
