//! Merge Orchestrator
//!
//! Runs one merge request end to end: validate, probe every input
//! concurrently, build the filter graph, then hand the command to the
//! transcode supervisor.

use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use tracing::Instrument;

use super::encoding::OutputOptions;
use super::filter_graph::{FilterGraph, OUTPUT_AUDIO_PAD, OUTPUT_VIDEO_PAD};
use super::progress::buffered_total;
use super::request::{MediaDescriptor, MergeRequest, VideoInfo};
use super::supervisor::{CancelToken, MergeEventSender, TranscodeJob, TranscodeSupervisor};
use crate::core::ffmpeg::{FFmpegRunner, SharedFFmpegState};
use crate::core::{CoreError, CoreResult};

/// Global options placed before the inputs
const GLOBAL_ARGS: &[&str] = &[
    "-hide_banner",
    "-nostdin",
    "-y",
    "-loglevel",
    "error",
    "-nostats",
    "-progress",
    "pipe:1",
];

/// Coordinates probing, graph construction and transcoding
#[derive(Clone)]
pub struct MergeOrchestrator {
    ffmpeg: SharedFFmpegState,
}

impl MergeOrchestrator {
    pub fn new(ffmpeg: SharedFFmpegState) -> Self {
        Self { ffmpeg }
    }

    async fn runner(&self) -> CoreResult<FFmpegRunner> {
        self.ffmpeg
            .read()
            .await
            .runner()
            .cloned()
            .ok_or(CoreError::EngineUnavailable)
    }

    /// Probe one input for the filter graph.
    pub async fn probe(&self, path: &Path) -> CoreResult<MediaDescriptor> {
        let runner = self.runner().await?;
        probe_with(&runner, path).await
    }

    /// Best-effort probe that never fails.
    ///
    /// Unreadable files are reported as 1920x1080 with audio so callers can
    /// still list them.
    pub async fn video_info(&self, path: &Path) -> VideoInfo {
        match self.probe(path).await {
            Ok(descriptor) => VideoInfo::from(&descriptor),
            Err(e) => {
                tracing::warn!("Could not analyze {}, using defaults: {}", path.display(), e);
                VideoInfo::fallback()
            }
        }
    }

    /// Merge the request's inputs into its output file.
    pub async fn merge(
        &self,
        job_id: &str,
        request: &MergeRequest,
        events: MergeEventSender,
        cancel: CancelToken,
    ) -> CoreResult<PathBuf> {
        let span = tracing::info_span!("merge_job", job_id = %job_id);
        self.merge_inner(job_id, request, events, cancel)
            .instrument(span)
            .await
    }

    async fn merge_inner(
        &self,
        job_id: &str,
        request: &MergeRequest,
        events: MergeEventSender,
        mut cancel: CancelToken,
    ) -> CoreResult<PathBuf> {
        request.validate()?;
        let runner = self.runner().await?;

        let target = request.resolution.dimensions();
        tracing::info!(
            "Merging {} videos into {} at {}",
            request.input_files.len(),
            request.output_path.display(),
            target
        );

        let probes = try_join_all(
            request
                .input_files
                .iter()
                .map(|path| probe_with(&runner, path)),
        );
        let descriptors = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Merge job {} cancelled while probing inputs", job_id);
                return Err(CoreError::Cancelled);
            }
            descriptors = probes => descriptors?,
        };

        for (i, descriptor) in descriptors.iter().enumerate() {
            tracing::debug!(
                "Input {}: {} audio={} duration={}s",
                i,
                descriptor.dimensions(),
                descriptor.has_audio,
                descriptor.duration_secs
            );
        }

        let graph = FilterGraph::build(&descriptors, target);
        let total_duration = buffered_total(descriptors.iter().map(|d| d.duration_secs));
        tracing::debug!("Total duration (buffered): {:.2}s", total_duration);

        let options = OutputOptions::new(runner.info().video_encoder);
        let args = build_command_args(
            &request.input_files,
            &graph,
            &options,
            &request.output_path,
        );

        let job = TranscodeJob {
            job_id: job_id.to_string(),
            args,
            output_path: request.output_path.clone(),
            total_duration,
        };

        TranscodeSupervisor::new(runner)
            .run(job, events, cancel)
            .await
    }
}

async fn probe_with(runner: &FFmpegRunner, path: &Path) -> CoreResult<MediaDescriptor> {
    let info = runner
        .probe(path)
        .await
        .map_err(|e| CoreError::probe(path.display().to_string(), e.to_string()))?;
    Ok(MediaDescriptor::from(&info))
}

/// Full ffmpeg argument list for a merge.
pub fn build_command_args(
    files: &[PathBuf],
    graph: &FilterGraph,
    options: &OutputOptions,
    output: &Path,
) -> Vec<String> {
    let mut args: Vec<String> = GLOBAL_ARGS.iter().map(|s| s.to_string()).collect();

    for input in graph.engine_inputs(files) {
        args.extend(input.to_args());
    }

    args.push("-filter_complex".to_string());
    args.push(graph.render());
    args.extend([
        "-map".to_string(),
        format!("[{}]", OUTPUT_VIDEO_PAD),
        "-map".to_string(),
        format!("[{}]", OUTPUT_AUDIO_PAD),
    ]);
    args.extend(options.to_args());
    args.push(output.to_string_lossy().into_owned());
    args
}
