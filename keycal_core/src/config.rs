//! Configuration types for the calibration engine.
//!
//! These are the runtime configuration structs used by `CalibrationEngine`.
//! They are separate from the TOML-deserialized config in `keycal_config`.

use keycal_traits::GainOffset;

/// Calibration math parameters, fixed for the lifetime of an engine.
#[derive(Debug, Clone)]
pub struct CalibrationCfg {
    /// Gain for channels without a committed calibration (offset is 0).
    pub default_gain: f32,
    /// Minimum `max - min` of the filtered signal before a channel is staged.
    pub threshold: f32,
    /// Relative-match gain `m_g`: the unit interval is scaled by this.
    pub match_gain: f32,
    /// Relative-match offset `m_o`: the unit interval is shifted by this.
    pub match_offset: f32,
    /// Reference ("orig") pair every staged calibration is expressed against.
    pub reference: GainOffset,
    /// Ticks after setup during which ranges are not tracked.
    pub warmup_ticks: u32,
}

impl CalibrationCfg {
    /// The calibration every channel falls back to.
    #[inline]
    pub fn default_pair(&self) -> GainOffset {
        GainOffset::new(self.default_gain, 0.0)
    }
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            default_gain: 1.0,
            threshold: 0.6,
            match_gain: 0.75,
            match_offset: 0.25,
            reference: GainOffset::new(1.0, 0.0),
            warmup_ticks: 0,
        }
    }
}

/// Non-volatile write policy.
#[derive(Debug, Clone)]
pub struct PersistenceCfg {
    /// Non-forced writes closer together than this are skipped.
    pub min_write_interval_ms: u64,
}

impl Default for PersistenceCfg {
    fn default() -> Self {
        Self {
            min_write_interval_ms: 10_000,
        }
    }
}

/// Diagnostic verbosity. Affects only which events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugLevel {
    #[default]
    Off,
    /// Periodic statistics.
    Stats,
    /// Switch edges, commits, resets, write outcomes.
    Events,
    /// Per-channel algorithm details.
    Verbose,
}

impl From<u8> for DebugLevel {
    fn from(v: u8) -> Self {
        match v {
            0 => DebugLevel::Off,
            1 => DebugLevel::Stats,
            2 => DebugLevel::Events,
            _ => DebugLevel::Verbose,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiagnosticsCfg {
    pub debug_level: DebugLevel,
    /// Ticks between periodic statistics.
    pub stats_interval_ticks: u32,
    /// Consecutive clamped ticks before a recalibration hint. 0 disables.
    pub clip_warn_ticks: u32,
}

impl Default for DiagnosticsCfg {
    fn default() -> Self {
        Self {
            debug_level: DebugLevel::Off,
            stats_interval_ticks: 10_000,
            clip_warn_ticks: 2_000,
        }
    }
}

/// Tick pacing for the runner.
#[derive(Debug, Clone)]
pub struct SamplingCfg {
    pub sample_period_us: u64,
    /// Max sensor wait per frame (ms).
    pub sensor_timeout_ms: u64,
}

impl Default for SamplingCfg {
    fn default() -> Self {
        Self {
            sample_period_us: 300,
            sensor_timeout_ms: 5,
        }
    }
}
