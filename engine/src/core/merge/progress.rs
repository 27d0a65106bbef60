//! Progress Estimation
//!
//! Turns FFmpeg's `-progress` output into a completion percentage.
//!
//! The engine reports how much output time it has written. Dividing by the
//! summed input duration gives a percentage; the total is padded by 1% so
//! container metadata that understates durations does not push the value
//! past 100 early. Reported values never go backwards, stop at 99.9 while
//! the engine runs, and reach 100.0 only once the job has succeeded.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::TimeSec;

/// Frame rate used to turn a frame count into elapsed time
const FALLBACK_FPS: f64 = 30.0;

/// Completion percentage with one decimal of precision
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percent(f64);

impl Percent {
    pub const ZERO: Percent = Percent(0.0);
    /// Highest value reported while the engine is still running
    pub const CAP: Percent = Percent(99.9);
    pub const COMPLETE: Percent = Percent(100.0);

    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

/// Sum of positive durations plus 1%, or 1.0 when nothing is known.
pub fn buffered_total(durations: impl IntoIterator<Item = TimeSec>) -> TimeSec {
    let sum: TimeSec = durations
        .into_iter()
        .filter(|d| d.is_finite() && *d > 0.0)
        .sum();
    if sum > 0.0 {
        sum * 1.01
    } else {
        1.0
    }
}

/// Percentage of `total` covered by `elapsed`, clamped to `[0, 99.9]`.
pub fn estimate(elapsed: TimeSec, total: TimeSec) -> Percent {
    if total <= 0.0 {
        return Percent::ZERO;
    }
    clamp_running(elapsed / total * 100.0)
}

/// Clamp a percentage from any other source the same way as [`estimate`].
pub fn estimate_percent(percent: f64) -> Percent {
    clamp_running(percent)
}

fn clamp_running(raw: f64) -> Percent {
    if !raw.is_finite() {
        return Percent::ZERO;
    }
    let clamped = raw.clamp(0.0, Percent::CAP.0);
    Percent((clamped * 10.0).round() / 10.0)
}

/// Parse an `HH:MM:SS(.fraction)` timemark into seconds.
///
/// Returns `None` for `N/A` and anything without exactly three fields. The
/// engine reports a large negative time before the first frame; that value
/// is returned as is and clamped by [`estimate`].
pub fn parse_timemark(value: &str) -> Option<TimeSec> {
    let mut parts = value.trim().split(':');
    let (Some(h), Some(m), Some(s), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };

    let hours: f64 = h.parse().ok()?;
    let minutes: f64 = m.parse().ok()?;
    let seconds: f64 = s.parse().ok()?;
    let negative = h.starts_with('-');

    let magnitude = hours.abs() * 3600.0 + minutes * 60.0 + seconds;
    Some(if negative { -magnitude } else { magnitude })
}

/// One progress observation
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ProgressUpdate {
    /// Output time written so far
    Timemark(TimeSec),
    /// Percentage derived from another signal
    Percent(f64),
}

/// One `key=value` block of `-progress` output
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProgressBlock {
    pub out_time: Option<TimeSec>,
    pub frame: Option<u64>,
    /// `progress=end` was seen
    pub ended: bool,
}

impl ProgressBlock {
    /// The observation this block carries, given the buffered total duration.
    pub fn update(&self, total: TimeSec) -> Option<ProgressUpdate> {
        if let Some(time) = self.out_time {
            return Some(ProgressUpdate::Timemark(time));
        }
        let frame = self.frame?;
        if total <= 0.0 {
            return None;
        }
        Some(ProgressUpdate::Percent(
            frame as f64 / (total * FALLBACK_FPS) * 100.0,
        ))
    }
}

/// Incremental parser for `-progress pipe:1` output
#[derive(Debug, Default)]
pub struct ProgressParser {
    current: ProgressBlock,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line; returns the finished block on `progress=...`.
    pub fn push_line(&mut self, line: &str) -> Option<ProgressBlock> {
        let (key, value) = line.trim().split_once('=')?;
        let value = value.trim();

        match key {
            "out_time" => self.current.out_time = parse_timemark(value),
            "frame" => self.current.frame = value.parse().ok(),
            "progress" => {
                let mut block = std::mem::take(&mut self.current);
                block.ended = value == "end";
                return Some(block);
            }
            _ => {}
        }
        None
    }
}

/// Monotonic progress state for one job
#[derive(Debug)]
pub struct ProgressTracker {
    total: TimeSec,
    last: Option<Percent>,
}

impl ProgressTracker {
    pub fn new(total: TimeSec) -> Self {
        Self { total, last: None }
    }

    pub fn total(&self) -> TimeSec {
        self.total
    }

    /// Last value handed out
    pub fn last(&self) -> Option<Percent> {
        self.last
    }

    /// Returns a value to report, or `None` if it would not move forward.
    pub fn observe(&mut self, update: ProgressUpdate) -> Option<Percent> {
        let percent = match update {
            ProgressUpdate::Timemark(elapsed) => estimate(elapsed, self.total),
            ProgressUpdate::Percent(p) => estimate_percent(p),
        };

        if self.last.is_some_and(|last| percent <= last) {
            return None;
        }
        self.last = Some(percent);
        Some(percent)
    }

    /// Terminal value after the engine has succeeded.
    pub fn finalize(self) -> Percent {
        Percent::COMPLETE
    }
}
