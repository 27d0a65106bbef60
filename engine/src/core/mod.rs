//! vidmerge Core Engine
//!
//! Engine discovery, media probing and merge orchestration.

pub mod ffmpeg;
pub mod merge;
pub mod process;
pub mod settings;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;

#[cfg(all(test, unix))]
pub(crate) mod test_support;
