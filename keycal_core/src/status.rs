//! Reports returned from each engine tick and engine-level counters.

use crate::persistence::WriteOutcome;

/// What one tick did to the calibration state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// True when the active table changed (commit of at least one channel, or reset).
    pub changed: bool,
    /// Channels whose staged calibration became active this tick.
    pub committed: usize,
    /// A reset edge cleared the calibration this tick.
    pub reset: bool,
    /// Outcome of the storage write attempted this tick, if any.
    pub write: Option<WriteOutcome>,
    /// Channels whose output was clamped this tick.
    pub clipped: usize,
}

/// Where the active table came from at setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSource {
    Storage,
    Defaults,
}

/// Snapshot of engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub ticks: u64,
    /// Channels whose active calibration differs from the default pair.
    pub calibrated: usize,
    /// Channels holding a staged calibration awaiting commit.
    pub staged: usize,
    /// Channels whose last output was clamped.
    pub clipping: usize,
    pub commits: u64,
    pub resets: u64,
    pub writes: u64,
    pub skipped_writes: u64,
    pub failed_writes: u64,
}
