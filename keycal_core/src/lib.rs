#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Self-calibration for arrays of analog key sensors (hardware-agnostic).
//!
//! Every tick the engine smooths each channel with a short moving average,
//! widens that channel's observed range, and stages a candidate
//! `gain`/`offset` once the range spans the threshold. A rising edge on the
//! freeze switch commits staged channels and asks for a rate-limited write;
//! a rising edge on the reset switch restores defaults and forces a write.
//! Output is always `gain * filtered + offset` clamped to `[0, 1]`, using
//! the active table only.
//!
//! Hardware is reached through `keycal_traits::{SensorArray, SwitchBank, Storage}`.
//!
//! ## Modules
//!
//! - `filter`: per-channel ring-buffer moving average
//! - `range`: min/max tracking since the last commit
//! - `staging`: build a staged calibration from a range (relative match)
//! - `calibration`: apply and clamp
//! - `switch`, `persistence`: edge latches and the write rate limiter
//! - `engine`: ties the above together per tick
//! - `sampler`, `runner`: drive an engine from live collaborators

pub mod calibration;
pub mod config;
pub mod conversions;
pub mod engine;
pub mod error;
pub mod filter;
pub mod hw_error;
pub mod mocks;
pub mod persistence;
pub mod range;
pub mod runner;
pub mod sampler;
pub mod staging;
pub mod status;
pub mod switch;
pub mod util;

pub use calibration::{Applied, OUTPUT_MAX, OUTPUT_MIN, apply, clip_limit};
pub use config::{CalibrationCfg, DebugLevel, DiagnosticsCfg, PersistenceCfg, SamplingCfg};
pub use engine::{CalibrationEngine, EngineBuilder};
pub use error::{BuildError, CalError, Report, Result};
pub use filter::FILTER_SAMPLES;
pub use persistence::WriteOutcome;
pub use runner::{RunParams, RunSummary, SamplingMode, run_ticks};
pub use status::{EngineStats, TableSource, TickReport};

pub use keycal_traits::{GainOffset, SwitchState};

/// Keys on a piano keyboard; the default channel count.
pub const NUM_NOTES: usize = 88;

/// Engine sized for a full keyboard.
pub type PianoEngine<S> = CalibrationEngine<S, NUM_NOTES>;
