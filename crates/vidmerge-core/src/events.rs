//! Event Broadcasting
//!
//! Merge jobs publish their lifecycle on a broadcast bus so any number of
//! front-ends (a desktop shell, the CLI, tests) can follow along without the
//! engine knowing who is listening.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use vidmerge_lib::core::merge::MergeEvent;
use vidmerge_lib::core::JobId;

// =============================================================================
// Event Types
// =============================================================================

/// Event names used on the bus
pub mod event_names {
    /// Engine spawned for a job
    pub const MERGE_STARTED: &str = "merge:started";
    /// Job progress moved forward
    pub const MERGE_PROGRESS: &str = "merge:progress";
    /// Job finished and the output is written
    pub const MERGE_COMPLETED: &str = "merge:completed";
    /// Job failed or was cancelled
    pub const MERGE_FAILED: &str = "merge:failed";
}

// =============================================================================
// Event Payloads
// =============================================================================

/// Merge started event payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeStartedEvent {
    pub job_id: JobId,
    /// Full engine command line, for diagnostics
    pub command: String,
}

/// Merge progress event payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeProgressEvent {
    pub job_id: JobId,
    /// Percentage with one decimal, "0.0" to "100.0"
    pub percent: String,
}

/// Merge completed event payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeCompletedEvent {
    pub job_id: JobId,
    pub output_path: String,
}

/// Merge failed event payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeFailedEvent {
    pub job_id: JobId,
    /// Error message
    pub reason: String,
}

/// Any event published on the bus
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum CoreEvent {
    #[serde(rename = "merge:started")]
    MergeStarted(MergeStartedEvent),
    #[serde(rename = "merge:progress")]
    MergeProgress(MergeProgressEvent),
    #[serde(rename = "merge:completed")]
    MergeCompleted(MergeCompletedEvent),
    #[serde(rename = "merge:failed")]
    MergeFailed(MergeFailedEvent),
}

impl CoreEvent {
    /// Event name as used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Self::MergeStarted(_) => event_names::MERGE_STARTED,
            Self::MergeProgress(_) => event_names::MERGE_PROGRESS,
            Self::MergeCompleted(_) => event_names::MERGE_COMPLETED,
            Self::MergeFailed(_) => event_names::MERGE_FAILED,
        }
    }

    pub fn job_id(&self) -> &str {
        match self {
            Self::MergeStarted(e) => &e.job_id,
            Self::MergeProgress(e) => &e.job_id,
            Self::MergeCompleted(e) => &e.job_id,
            Self::MergeFailed(e) => &e.job_id,
        }
    }

    /// Lift a job-local event onto the bus
    pub fn from_merge_event(job_id: &str, event: MergeEvent) -> Self {
        match event {
            MergeEvent::Started { command } => Self::MergeStarted(MergeStartedEvent {
                job_id: job_id.to_string(),
                command,
            }),
            MergeEvent::Progress { percent } => Self::MergeProgress(MergeProgressEvent {
                job_id: job_id.to_string(),
                percent: percent.to_string(),
            }),
        }
    }
}

// =============================================================================
// Event Bus
// =============================================================================

/// Default number of events buffered per subscriber
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// Broadcast bus for [`CoreEvent`]s
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: CoreEvent) {
        tracing::trace!("Emitting {} for job {}", event.name(), event.job_id());
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidmerge_lib::core::merge::estimate;

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::MergeProgress(MergeProgressEvent {
            job_id: "01J".to_string(),
            percent: "42.0".to_string(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "event": "merge:progress",
                "payload": { "jobId": "01J", "percent": "42.0" }
            })
        );
        assert_eq!(event.name(), event_names::MERGE_PROGRESS);
    }

    #[test]
    fn test_from_merge_event_formats_percent() {
        let event = CoreEvent::from_merge_event(
            "job",
            MergeEvent::Progress {
                percent: estimate(15.0, 15.15),
            },
        );
        match event {
            CoreEvent::MergeProgress(payload) => assert_eq!(payload.percent, "99.0"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bus_fans_out() {
        let bus = EventBus::default();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        let event = CoreEvent::MergeFailed(MergeFailedEvent {
            job_id: "job".to_string(),
            reason: "boom".to_string(),
        });
        bus.emit(event.clone());

        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap(), event);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(0);
        bus.emit(CoreEvent::MergeCompleted(MergeCompletedEvent {
            job_id: "job".to_string(),
            output_path: "/tmp/out.mp4".to_string(),
        }));

        // Later subscribers only see later events.
        let mut late = bus.subscribe();
        assert!(matches!(
            late.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
