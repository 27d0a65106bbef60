//! vidmerge Core Type Definitions
//!
//! Small shared types used across the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Merge job unique identifier (ULID)
pub type JobId = String;

/// Time in seconds (floating point)
pub type TimeSec = f64;

/// Frame dimensions in pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Fallback used whenever a probe cannot tell us the real frame size.
    pub const FULL_HD: Dimensions = Dimensions::new(1920, 1080);
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::FULL_HD
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Generates a new job ID.
pub fn new_job_id() -> JobId {
    ulid::Ulid::new().to_string()
}
