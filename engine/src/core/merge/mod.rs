//! Merge Module
//!
//! Concatenates heterogeneous videos into one file:
//! - Request validation and media descriptors
//! - Filter graph construction (scale/pad, fps, audio normalization, silence)
//! - Fixed output encoding policy
//! - Progress estimation from `-progress` output
//! - Transcode supervision with cancellation
//! - End-to-end orchestration

mod encoding;
mod filter_graph;
mod orchestrator;
mod progress;
mod request;
mod supervisor;

pub use encoding::OutputOptions;
pub use filter_graph::{
    AudioBranch, EngineInput, Filter, FilterChain, FilterGraph, Pad, DEFAULT_SILENCE_SECS,
    OUTPUT_FPS, SILENT_SOURCE,
};
pub use orchestrator::{build_command_args, MergeOrchestrator};
pub use progress::{
    buffered_total, estimate, estimate_percent, parse_timemark, Percent, ProgressBlock,
    ProgressParser, ProgressTracker, ProgressUpdate,
};
pub use request::{default_output_path, MediaDescriptor, MergeRequest, Resolution, VideoInfo};
pub use supervisor::{
    cancellation, CancelToken, JobHandle, MergeEvent, MergeEventSender, TranscodeJob,
    TranscodeSupervisor,
};
