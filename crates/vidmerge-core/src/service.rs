//! Merge Service
//!
//! The request/response surface front-ends call into. Each merge gets a job
//! ID; its lifecycle is published on the [`EventBus`] and the final result is
//! returned to the caller.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use vidmerge_lib::core::ffmpeg::{create_ffmpeg_state, FFmpegInfo, SharedFFmpegState};
use vidmerge_lib::core::merge::{
    cancellation, JobHandle, MergeEvent, MergeOrchestrator, MergeRequest, VideoInfo,
};
use vidmerge_lib::core::settings::EngineSettings;
use vidmerge_lib::core::{new_job_id, CoreError, JobId};

use crate::events::{CoreEvent, EventBus, MergeCompletedEvent, MergeFailedEvent};

/// Value resolved by a successful merge
pub const MERGE_SUCCESS: &str = "success";

/// Engine availability as seen by callers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub available: bool,
    pub version: Option<String>,
    pub ffmpeg_path: Option<String>,
    pub ffprobe_path: Option<String>,
    /// FFmpeg encoder name, e.g. "h264_videotoolbox"
    pub video_encoder: Option<String>,
    pub hardware_accelerated: bool,
}

impl EngineStatus {
    fn unavailable() -> Self {
        Self {
            available: false,
            version: None,
            ffmpeg_path: None,
            ffprobe_path: None,
            video_encoder: None,
            hardware_accelerated: false,
        }
    }

    fn from_info(info: &FFmpegInfo) -> Self {
        Self {
            available: true,
            version: Some(info.version.clone()),
            ffmpeg_path: Some(info.ffmpeg_path.display().to_string()),
            ffprobe_path: Some(info.ffprobe_path.display().to_string()),
            video_encoder: Some(info.video_encoder.encoder_name().to_string()),
            hardware_accelerated: info.is_hardware_accelerated(),
        }
    }
}

/// Caller-facing merge API
#[derive(Clone)]
pub struct MergeService {
    ffmpeg: SharedFFmpegState,
    orchestrator: MergeOrchestrator,
    bus: EventBus,
    jobs: Arc<Mutex<HashMap<JobId, JobHandle>>>,
}

impl MergeService {
    /// Service over an existing engine state
    pub fn new(ffmpeg: SharedFFmpegState) -> Self {
        Self {
            orchestrator: MergeOrchestrator::new(ffmpeg.clone()),
            ffmpeg,
            bus: EventBus::default(),
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Detect the engine from settings and build a service around it.
    ///
    /// A missing engine is logged, not returned: the service still answers
    /// `video_info` and `status`, and merges fail with an engine error.
    pub async fn from_settings(settings: &EngineSettings) -> Self {
        let ffmpeg = create_ffmpeg_state();

        let detect_settings = settings.clone();
        let detected = tokio::task::spawn_blocking(move || {
            let mut state = vidmerge_lib::core::ffmpeg::FFmpegState::new();
            state.initialize(&detect_settings).map(|_| state)
        })
        .await;

        match detected {
            Ok(Ok(state)) => *ffmpeg.write().await = state,
            Ok(Err(e)) => tracing::warn!("FFmpeg unavailable: {}", e),
            Err(e) => tracing::error!("FFmpeg detection task failed: {}", e),
        }

        Self::new(ffmpeg)
    }

    /// Follow merge events
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.bus.subscribe()
    }

    /// Best-effort media summary; never fails.
    pub async fn video_info(&self, path: &Path) -> VideoInfo {
        self.orchestrator.video_info(path).await
    }

    /// Merge videos under a fresh job ID.
    pub async fn merge_videos(&self, request: MergeRequest) -> Result<String, String> {
        self.merge_videos_as(new_job_id(), request).await
    }

    /// Merge videos under a caller-chosen job ID, so the caller can cancel it.
    ///
    /// An ID that is still running is rejected without touching that job.
    pub async fn merge_videos_as(
        &self,
        job_id: JobId,
        request: MergeRequest,
    ) -> Result<String, String> {
        let (handle, token) = cancellation(&job_id);
        match self.jobs_lock().entry(job_id.clone()) {
            Entry::Occupied(_) => {
                tracing::warn!("Merge job {} is already running", job_id);
                return Err(format!("Merge job {} is already running", job_id));
            }
            Entry::Vacant(slot) => {
                slot.insert(handle);
            }
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<MergeEvent>();
        let forwarder = {
            let bus = self.bus.clone();
            let job_id = job_id.clone();
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    bus.emit(CoreEvent::from_merge_event(&job_id, event));
                }
            })
        };

        let result = self.orchestrator.merge(&job_id, &request, tx, token).await;
        self.jobs_lock().remove(&job_id);

        // Every job event reaches the bus before the terminal one.
        if let Err(e) = forwarder.await {
            tracing::warn!("Event forwarder for job {} failed: {}", job_id, e);
        }

        match result {
            Ok(output) => {
                self.bus.emit(CoreEvent::MergeCompleted(MergeCompletedEvent {
                    job_id,
                    output_path: output.display().to_string(),
                }));
                Ok(MERGE_SUCCESS.to_string())
            }
            Err(e) => {
                log_failure(&job_id, &e);
                let reason = e.to_ipc_error();
                self.bus.emit(CoreEvent::MergeFailed(MergeFailedEvent {
                    job_id,
                    reason: reason.clone(),
                }));
                Err(reason)
            }
        }
    }

    /// Cancel a running job. Returns false if no such job is running.
    pub fn cancel(&self, job_id: &str) -> bool {
        match self.jobs_lock().remove(job_id) {
            Some(handle) => handle.cancel(),
            None => false,
        }
    }

    /// IDs of jobs currently running
    pub fn running_jobs(&self) -> Vec<JobId> {
        self.jobs_lock().keys().cloned().collect()
    }

    /// Engine availability and the encoder merges will use
    pub async fn status(&self) -> EngineStatus {
        match self.ffmpeg.read().await.info() {
            Some(info) => EngineStatus::from_info(info),
            None => EngineStatus::unavailable(),
        }
    }

    fn jobs_lock(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, JobHandle>> {
        // Poisoning is ignored.
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn log_failure(job_id: &str, error: &CoreError) {
    match error {
        CoreError::Cancelled => tracing::info!("Merge job {} cancelled", job_id),
        e if e.is_pre_spawn() => tracing::warn!("Merge job {} rejected: {}", job_id, e),
        e => tracing::error!("Merge job {} failed: {}", job_id, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidmerge_lib::core::merge::Resolution;

    fn collect(rx: &mut broadcast::Receiver<CoreEvent>) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_unavailable_engine_status() {
        let service = MergeService::new(create_ffmpeg_state());
        let status = service.status().await;
        assert_eq!(status, EngineStatus::unavailable());

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["available"], false);
        assert!(json.get("hardwareAccelerated").is_some());
    }

    #[tokio::test]
    async fn test_video_info_never_fails() {
        let service = MergeService::new(create_ffmpeg_state());
        let info = service.video_info(Path::new("/nope/missing.mov")).await;
        assert_eq!(info, VideoInfo::fallback());
    }

    #[tokio::test]
    async fn test_rejected_merge_emits_failed_event() {
        let service = MergeService::new(create_ffmpeg_state());
        let mut rx = service.subscribe();

        let request = MergeRequest::new(["one.mp4"], "out.mp4", Resolution::default());
        let err = service
            .merge_videos_as("job-1".to_string(), request)
            .await
            .unwrap_err();
        assert!(!err.is_empty());

        let events = collect(&mut rx);
        assert_eq!(
            events,
            vec![CoreEvent::MergeFailed(MergeFailedEvent {
                job_id: "job-1".to_string(),
                reason: err,
            })]
        );
        assert!(service.running_jobs().is_empty());
    }

    #[tokio::test]
    async fn test_missing_engine_fails_merge() {
        let service = MergeService::new(create_ffmpeg_state());
        let request = MergeRequest::new(["a.mp4", "b.mp4"], "out.mp4", Resolution::default());
        let err = service.merge_videos(request).await.unwrap_err();
        assert_eq!(err, CoreError::EngineUnavailable.to_string());
    }

    #[test]
    fn test_cancel_unknown_job() {
        let service = MergeService::new(create_ffmpeg_state());
        assert!(!service.cancel("nope"));
    }

    #[cfg(unix)]
    mod with_fake_engine {
        use super::*;
        use std::fs::OpenOptions;
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        use std::path::PathBuf;
        use std::time::Duration;
        use tempfile::TempDir;

        fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
            let path = dir.join(name);
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .mode(0o755)
                .open(&path)
                .unwrap();
            writeln!(file, "#!/bin/sh").unwrap();
            file.write_all(body.as_bytes()).unwrap();
            file.sync_all().unwrap();
            path
        }

        async fn service_with(dir: &TempDir, ffmpeg_body: &str) -> MergeService {
            let ffmpeg = write_script(dir.path(), "ffmpeg", ffmpeg_body);
            let ffprobe = write_script(
                dir.path(),
                "ffprobe",
                r#"echo '{"format":{"duration":"5.0"},"streams":[{"codec_type":"video","width":640,"height":360},{"codec_type":"audio"}]}'"#,
            );

            let state = create_ffmpeg_state();
            state
                .write()
                .await
                .set_info(FFmpegInfo::from_paths(ffmpeg, ffprobe));
            MergeService::new(state)
        }

        fn request(dir: &TempDir) -> MergeRequest {
            let inputs: Vec<PathBuf> = ["a.mp4", "b.mp4"]
                .iter()
                .map(|name| {
                    let path = dir.path().join(name);
                    std::fs::write(&path, b"fake").unwrap();
                    path
                })
                .collect();
            MergeRequest::new(inputs, dir.path().join("out.mp4"), Resolution::Hd720)
        }

        #[tokio::test]
        async fn test_successful_merge_event_sequence() {
            let temp_dir = TempDir::new().unwrap();
            let service = service_with(
                &temp_dir,
                r#"
echo "out_time=00:00:02.000000"
echo "progress=continue"
echo "out_time=00:00:10.000000"
echo "progress=end"
"#,
            )
            .await;
            let mut rx = service.subscribe();

            let result = service
                .merge_videos_as("job-ok".to_string(), request(&temp_dir))
                .await;
            assert_eq!(result, Ok(MERGE_SUCCESS.to_string()));

            let events = collect(&mut rx);
            let names: Vec<&str> = events.iter().map(CoreEvent::name).collect();
            assert_eq!(
                names,
                vec![
                    "merge:started",
                    "merge:progress",
                    "merge:progress",
                    "merge:progress",
                    "merge:completed"
                ]
            );
            let percents: Vec<String> = events
                .iter()
                .filter_map(|e| match e {
                    CoreEvent::MergeProgress(p) => Some(p.percent.clone()),
                    _ => None,
                })
                .collect();
            // Total is 10 * 1.01 = 10.1 seconds.
            assert_eq!(percents, vec!["19.8", "99.0", "100.0"]);
            assert!(events.iter().all(|e| e.job_id() == "job-ok"));
        }

        #[tokio::test]
        async fn test_engine_failure_reason_is_stderr() {
            let temp_dir = TempDir::new().unwrap();
            let service = service_with(
                &temp_dir,
                "echo 'Unknown encoder libx264' >&2\nexit 1\n",
            )
            .await;
            let mut rx = service.subscribe();

            let err = service.merge_videos(request(&temp_dir)).await.unwrap_err();
            assert_eq!(err, "Unknown encoder libx264");

            let events = collect(&mut rx);
            assert!(matches!(events.last(), Some(CoreEvent::MergeFailed(_))));
            assert!(!events.iter().any(|e| matches!(
                e,
                CoreEvent::MergeProgress(p) if p.percent == "100.0"
            )));
        }

        #[tokio::test]
        async fn test_cancel_running_merge() {
            let temp_dir = TempDir::new().unwrap();
            let service = service_with(
                &temp_dir,
                "echo 'out_time=00:00:01.000000'\necho 'progress=continue'\nexec sleep 30\n",
            )
            .await;
            let mut rx = service.subscribe();

            let merge = tokio::spawn({
                let service = service.clone();
                let request = request(&temp_dir);
                async move { service.merge_videos_as("job-c".to_string(), request).await }
            });

            // Wait until the engine reports progress.
            loop {
                let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
                    .await
                    .unwrap()
                    .unwrap();
                if matches!(event, CoreEvent::MergeProgress(_)) {
                    break;
                }
            }
            assert_eq!(service.running_jobs(), vec!["job-c".to_string()]);
            assert!(service.cancel("job-c"));

            let err = tokio::time::timeout(Duration::from_secs(10), merge)
                .await
                .unwrap()
                .unwrap()
                .unwrap_err();
            assert_eq!(err, CoreError::Cancelled.to_string());
            assert!(service.running_jobs().is_empty());
        }

        #[tokio::test]
        async fn test_duplicate_job_id_is_rejected() {
            let temp_dir = TempDir::new().unwrap();
            let service = service_with(
                &temp_dir,
                "echo 'out_time=00:00:01.000000'\necho 'progress=continue'\nexec sleep 30\n",
            )
            .await;
            let mut rx = service.subscribe();

            let first = tokio::spawn({
                let service = service.clone();
                let request = request(&temp_dir);
                async move { service.merge_videos_as("job-d".to_string(), request).await }
            });

            loop {
                let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
                    .await
                    .unwrap()
                    .unwrap();
                if matches!(event, CoreEvent::MergeProgress(_)) {
                    break;
                }
            }

            let err = service
                .merge_videos_as("job-d".to_string(), request(&temp_dir))
                .await
                .unwrap_err();
            assert!(err.contains("already running"));
            assert!(collect(&mut rx).is_empty());

            // The first job keeps its handle.
            assert_eq!(service.running_jobs(), vec!["job-d".to_string()]);
            assert!(service.cancel("job-d"));

            let err = tokio::time::timeout(Duration::from_secs(10), first)
                .await
                .unwrap()
                .unwrap()
                .unwrap_err();
            assert_eq!(err, CoreError::Cancelled.to_string());
        }
    }
}
