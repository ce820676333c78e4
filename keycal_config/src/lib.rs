#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and CSV formats for the key-sensor calibration engine.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - `table` holds the persisted calibration table schema and its CSV form.
//! - `trace` loads recorded sensor traces for offline replay.
use serde::Deserialize;

pub mod table;
pub mod trace;

pub use table::{PersistedEntry, PersistedTable, TableRow, load_table_csv, write_table_csv};
pub use trace::{TraceRow, load_trace_csv, read_trace};

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Gain applied to channels that have never been calibrated (offset is 0).
    pub default_gain: f32,
    /// Minimum filtered span before a channel is trusted for calibration.
    pub threshold: f32,
    /// Relative-match gain applied on top of the unit mapping.
    pub match_gain: f32,
    /// Relative-match offset applied on top of the unit mapping.
    pub match_offset: f32,
    /// Reference ("orig") gain that staged values are expressed against.
    pub reference_gain: f32,
    /// Reference ("orig") offset that staged values are expressed against.
    pub reference_offset: f32,
    /// Ticks after startup during which ranges are not tracked.
    pub warmup_ticks: u32,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            default_gain: 1.0,
            threshold: 0.6,
            match_gain: 0.75,
            match_offset: 0.25,
            reference_gain: 1.0,
            reference_offset: 0.0,
            warmup_ticks: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// TOML file replaced atomically on every write.
    #[default]
    File,
    /// Byte image emulating an EEPROM part, saved next to `path`.
    Eeprom,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PersistenceCfg {
    /// Minimum time between two non-forced writes.
    pub min_write_interval_ms: u64,
    pub backend: StorageBackend,
    pub path: String,
}

impl Default for PersistenceCfg {
    fn default() -> Self {
        Self {
            min_write_interval_ms: 10_000,
            backend: StorageBackend::File,
            path: "keycal_calibration.toml".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SamplingCfg {
    /// Tick period. Also accepts alias "adc_sample_period_microseconds".
    #[serde(alias = "adc_sample_period_microseconds")]
    pub sample_period_us: u64,
    /// Max time to wait for one sensor frame.
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DiagnosticsCfg {
    /// 0 = quiet, 1 = periodic statistics, 2 = events, 3 = algorithm details.
    pub debug_level: u8,
    /// Ticks between periodic statistics (debug_level >= 1).
    pub stats_interval_ticks: u32,
    /// Consecutive clamped ticks on one channel before a recalibration hint (0 disables).
    pub clip_warn_ticks: u32,
}

impl Default for DiagnosticsCfg {
    fn default() -> Self {
        Self {
            debug_level: 0,
            stats_interval_ticks: 10_000,
            clip_warn_ticks: 2_000,
        }
    }
}

/// GPIO inputs for the calibration switches (BCM numbering). Only used by
/// builds with physical hardware; unset pins mean simulated switches.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SwitchesCfg {
    pub freeze_pin: Option<u8>,
    pub reset_pin: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub calibration: CalibrationCfg,
    pub persistence: PersistenceCfg,
    pub sampling: SamplingCfg,
    pub diagnostics: DiagnosticsCfg,
    pub switches: SwitchesCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Calibration
        let c = &self.calibration;
        if !c.default_gain.is_finite() || c.default_gain == 0.0 {
            eyre::bail!("calibration.default_gain must be finite and non-zero");
        }
        if !c.threshold.is_finite() || c.threshold <= 0.0 {
            eyre::bail!("calibration.threshold must be > 0");
        }
        if !c.match_gain.is_finite() || c.match_gain <= 0.0 {
            eyre::bail!("calibration.match_gain must be > 0");
        }
        if !c.match_offset.is_finite() {
            eyre::bail!("calibration.match_offset must be finite");
        }
        if !c.reference_gain.is_finite() || c.reference_gain <= 0.0 {
            eyre::bail!("calibration.reference_gain must be > 0");
        }
        if !c.reference_offset.is_finite() {
            eyre::bail!("calibration.reference_offset must be finite");
        }

        // Persistence
        if self.persistence.min_write_interval_ms > 24 * 60 * 60 * 1000 {
            eyre::bail!("persistence.min_write_interval_ms is unreasonably large (>24h)");
        }
        if self.persistence.path.trim().is_empty() {
            eyre::bail!("persistence.path must not be empty");
        }

        // Sampling
        if self.sampling.sample_period_us == 0 {
            eyre::bail!("sampling.sample_period_us must be >= 1");
        }
        if self.sampling.sample_period_us > 1_000_000 {
            eyre::bail!("sampling.sample_period_us is unreasonably large (>1s)");
        }
        if self.sampling.sensor_timeout_ms == 0 {
            eyre::bail!("sampling.sensor_timeout_ms must be >= 1");
        }

        // Diagnostics
        if self.diagnostics.debug_level > 3 {
            eyre::bail!("diagnostics.debug_level must be in [0, 3]");
        }
        if self.diagnostics.stats_interval_ticks == 0 {
            eyre::bail!("diagnostics.stats_interval_ticks must be >= 1");
        }

        // Switches: both or neither, and distinct
        match (self.switches.freeze_pin, self.switches.reset_pin) {
            (Some(f), Some(r)) if f == r => {
                eyre::bail!("switches.freeze_pin and switches.reset_pin must differ")
            }
            (Some(_), None) | (None, Some(_)) => {
                eyre::bail!("switches.freeze_pin and switches.reset_pin must be set together")
            }
            _ => {}
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_instrument_defaults() {
        let cfg = load_toml("").expect("empty TOML parses");
        assert!((cfg.calibration.threshold - 0.6).abs() < f32::EPSILON);
        assert!((cfg.calibration.match_gain - 0.75).abs() < f32::EPSILON);
        assert!((cfg.calibration.match_offset - 0.25).abs() < f32::EPSILON);
        assert_eq!(cfg.sampling.sample_period_us, 300);
        assert_eq!(cfg.persistence.backend, StorageBackend::File);
        cfg.validate().expect("defaults are valid");
    }

    #[test]
    fn sample_period_alias_is_accepted() {
        let cfg = load_toml("[sampling]\nadc_sample_period_microseconds = 250\n").unwrap();
        assert_eq!(cfg.sampling.sample_period_us, 250);
    }

    #[test]
    fn unknown_backend_is_a_parse_error() {
        assert!(load_toml("[persistence]\nbackend = \"flash\"\n").is_err());
    }
}
