//! `From` implementations bridging `keycal_config` types to `keycal_core` types.

use keycal_traits::GainOffset;

use crate::config::{CalibrationCfg, DebugLevel, DiagnosticsCfg, PersistenceCfg, SamplingCfg};

// ── CalibrationCfg ───────────────────────────────────────────────────────────

impl From<&keycal_config::CalibrationCfg> for CalibrationCfg {
    fn from(c: &keycal_config::CalibrationCfg) -> Self {
        Self {
            default_gain: c.default_gain,
            threshold: c.threshold,
            match_gain: c.match_gain,
            match_offset: c.match_offset,
            reference: GainOffset::new(c.reference_gain, c.reference_offset),
            warmup_ticks: c.warmup_ticks,
        }
    }
}

// ── PersistenceCfg ───────────────────────────────────────────────────────────

impl From<&keycal_config::PersistenceCfg> for PersistenceCfg {
    fn from(c: &keycal_config::PersistenceCfg) -> Self {
        Self {
            min_write_interval_ms: c.min_write_interval_ms,
        }
    }
}

// ── DiagnosticsCfg ───────────────────────────────────────────────────────────

impl From<&keycal_config::DiagnosticsCfg> for DiagnosticsCfg {
    fn from(c: &keycal_config::DiagnosticsCfg) -> Self {
        Self {
            debug_level: DebugLevel::from(c.debug_level),
            stats_interval_ticks: c.stats_interval_ticks,
            clip_warn_ticks: c.clip_warn_ticks,
        }
    }
}

// ── SamplingCfg ──────────────────────────────────────────────────────────────

impl From<&keycal_config::SamplingCfg> for SamplingCfg {
    fn from(c: &keycal_config::SamplingCfg) -> Self {
        Self {
            sample_period_us: c.sample_period_us,
            sensor_timeout_ms: c.sensor_timeout_ms,
        }
    }
}
