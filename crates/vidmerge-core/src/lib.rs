//! vidmerge Core
//!
//! Front-end facing layer over the merge engine: the [`MergeService`]
//! request/response API and the event bus its jobs publish on.
//!
//! Engine types are re-exported so callers depend on this crate only.

pub mod events;
pub mod service;

pub use events::{
    event_names, CoreEvent, EventBus, MergeCompletedEvent, MergeFailedEvent, MergeProgressEvent,
    MergeStartedEvent,
};
pub use service::{EngineStatus, MergeService, MERGE_SUCCESS};

pub use vidmerge_lib::core::merge::{
    default_output_path, MergeRequest, Percent, Resolution, VideoInfo,
};
pub use vidmerge_lib::core::settings::{EngineSettings, SettingsLoader};
pub use vidmerge_lib::core::{new_job_id, CoreError, JobId};
pub use vidmerge_lib::init_logging;
