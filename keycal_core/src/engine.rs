//! The per-tick calibration engine (`CalibrationEngine`).
//!
//! One tick, in order:
//! 1. filter every channel and widen its range (after warm-up), restaging
//!    any channel whose range widened past the threshold;
//! 2. evaluate switch edges: a reset edge restores defaults and forces a
//!    write, otherwise a freeze edge commits staged channels and requests a
//!    rate-limited write;
//! 3. apply the (possibly just committed) active table and clamp.
//!
//! Active values change only in step 2, so a tick's outputs are computed
//! from one consistent table.

use std::sync::Arc;
use std::time::Instant;

use keycal_traits::clock::{Clock, MonotonicClock};
use keycal_traits::{GainOffset, Storage, SwitchState};

use crate::calibration::{apply, is_valid_table};
use crate::config::{CalibrationCfg, DebugLevel, DiagnosticsCfg, PersistenceCfg};
use crate::error::{BuildError, Result};
use crate::filter::RingFilter;
use crate::hw_error::map_storage_error;
use crate::persistence::{WriteGate, WriteOutcome};
use crate::range::RangeTracker;
use crate::staging::{self, MatchParams};
use crate::status::{EngineStats, TableSource, TickReport};
use crate::switch::EdgeLatch;

pub struct CalibrationEngine<S: Storage, const N: usize> {
    pub(crate) storage: S,
    pub(crate) calibration: CalibrationCfg,
    pub(crate) diagnostics: DiagnosticsCfg,
    pub(crate) params: MatchParams,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) epoch: Instant,
    pub(crate) gate: WriteGate,

    pub(crate) filter: RingFilter<N>,
    pub(crate) ranges: RangeTracker<N>,
    pub(crate) filtered: [f32; N],
    pub(crate) active: [GainOffset; N],
    pub(crate) staged: [Option<GainOffset>; N],
    pub(crate) clip_streak: [u32; N],

    pub(crate) freeze: EdgeLatch,
    pub(crate) reset: EdgeLatch,
    pub(crate) source: TableSource,
    pub(crate) stats: EngineStats,
}

impl<S: Storage, const N: usize> core::fmt::Debug for CalibrationEngine<S, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CalibrationEngine")
            .field("channels", &N)
            .field("source", &self.source)
            .field("ticks", &self.stats.ticks)
            .field("staged", &self.staged.iter().filter(|s| s.is_some()).count())
            .finish()
    }
}

/// Builder for `CalibrationEngine`. Validation happens in `setup()`.
pub struct EngineBuilder<S, const N: usize> {
    storage: S,
    calibration: Option<CalibrationCfg>,
    persistence: Option<PersistenceCfg>,
    diagnostics: Option<DiagnosticsCfg>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    initial_switches: SwitchState,
}

impl<S: Storage, const N: usize> EngineBuilder<S, N> {
    pub fn with_calibration(mut self, calibration: CalibrationCfg) -> Self {
        self.calibration = Some(calibration);
        self
    }

    pub fn with_persistence(mut self, persistence: PersistenceCfg) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: DiagnosticsCfg) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Inject a clock (e.g., `ManualClock` for replays and tests).
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Seed the edge latches with the switch levels seen at power-up, so a
    /// switch left on does not fire on the first tick.
    pub fn with_initial_switches(mut self, switches: SwitchState) -> Self {
        self.initial_switches = switches;
        self
    }

    /// Validate configuration, load the stored table and clear transient state.
    pub fn setup(self) -> Result<CalibrationEngine<S, N>> {
        let calibration = self.calibration.unwrap_or_default();
        validate(&calibration)?;
        let persistence = self.persistence.unwrap_or_default();
        let diagnostics = self.diagnostics.unwrap_or_default();
        if diagnostics.stats_interval_ticks == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "stats_interval_ticks must be >= 1",
            )));
        }

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(b) => Arc::from(b),
            None => Arc::new(MonotonicClock::new()),
        };
        let epoch = clock.now();

        let mut storage = self.storage;
        let default_pair = calibration.default_pair();
        let mut active = [default_pair; N];
        let source = match storage.load() {
            Ok(Some(table)) if is_valid_table(&table, N) => {
                active.copy_from_slice(&table);
                TableSource::Storage
            }
            Ok(Some(table)) => {
                tracing::warn!(
                    stored = table.len(),
                    channels = N,
                    "stored calibration invalid; using defaults"
                );
                TableSource::Defaults
            }
            Ok(None) => {
                if diagnostics.debug_level >= DebugLevel::Events {
                    tracing::info!("no stored calibration; using defaults");
                }
                TableSource::Defaults
            }
            Err(e) => {
                let err = map_storage_error(&*e);
                tracing::warn!(error = %err, "calibration load failed; using defaults");
                TableSource::Defaults
            }
        };

        if diagnostics.debug_level >= DebugLevel::Events {
            tracing::info!(
                channels = N,
                source = ?source,
                default_gain = calibration.default_gain,
                threshold = calibration.threshold,
                match_gain = calibration.match_gain,
                match_offset = calibration.match_offset,
                min_write_interval_ms = persistence.min_write_interval_ms,
                "calibration engine ready"
            );
        }

        let params = MatchParams::from(&calibration);
        Ok(CalibrationEngine {
            storage,
            params,
            calibration,
            diagnostics,
            clock,
            epoch,
            gate: WriteGate::new(persistence.min_write_interval_ms),
            filter: RingFilter::new(),
            ranges: RangeTracker::new(),
            filtered: [0.0; N],
            active,
            staged: [None; N],
            clip_streak: [0; N],
            freeze: EdgeLatch::new(self.initial_switches.freeze),
            reset: EdgeLatch::new(self.initial_switches.reset),
            source,
            stats: EngineStats::default(),
        })
    }
}

fn validate(c: &CalibrationCfg) -> Result<()> {
    let invalid = |msg| Err(eyre::Report::new(BuildError::InvalidConfig(msg)));
    if !c.default_gain.is_finite() || c.default_gain == 0.0 {
        return invalid("default_gain must be finite and non-zero");
    }
    if !c.threshold.is_finite() || c.threshold <= 0.0 {
        return invalid("threshold must be > 0");
    }
    if !c.match_gain.is_finite() || c.match_gain <= 0.0 {
        return invalid("match_gain must be > 0");
    }
    if !c.reference.gain.is_finite() || c.reference.gain <= 0.0 {
        return invalid("reference gain must be > 0");
    }
    if !c.match_offset.is_finite() || !c.reference.offset.is_finite() {
        return invalid("match and reference offsets must be finite");
    }
    Ok(())
}

impl<S: Storage, const N: usize> CalibrationEngine<S, N> {
    /// Start building an engine around a storage collaborator.
    pub fn builder(storage: S) -> EngineBuilder<S, N> {
        EngineBuilder {
            storage,
            calibration: None,
            persistence: None,
            diagnostics: None,
            clock: None,
            initial_switches: SwitchState::default(),
        }
    }

    /// Process one frame: filter, track, stage, handle switch edges, apply.
    ///
    /// Never fails; storage problems are reported in the returned report.
    pub fn tick(&mut self, raw: &[f32; N], switches: SwitchState, out: &mut [f32; N]) -> TickReport {
        let tracking = self.stats.ticks >= u64::from(self.calibration.warmup_ticks);
        for (ch, &x) in raw.iter().enumerate() {
            // An unprimed channel has no history; it outputs from 0.0 and is not tracked.
            let Some(f) = self.filter.filter(ch, x) else {
                continue;
            };
            self.filtered[ch] = f;
            if tracking && self.ranges.update(ch, f) {
                self.restage(ch);
            }
        }
        self.filter.advance();

        let mut report = TickReport::default();
        let freeze_edge = self.freeze.rising(switches.freeze);
        let reset_edge = self.reset.rising(switches.reset);
        if reset_edge {
            if self.diagnostics.debug_level >= DebugLevel::Events {
                tracing::info!(freeze_edge, "reset switch edge");
            }
            self.clear_calibration();
            report.reset = true;
            report.changed = true;
            report.write = Some(self.write_storage(true));
        } else if freeze_edge {
            let committed = self.commit_staged();
            if self.diagnostics.debug_level >= DebugLevel::Events {
                tracing::info!(committed, "freeze switch edge");
            }
            report.committed = committed;
            if committed > 0 {
                report.changed = true;
                report.write = Some(self.write_storage(false));
            }
        }

        for (ch, y) in out.iter_mut().enumerate() {
            let applied = apply(self.active[ch], self.filtered[ch]);
            *y = applied.value;
            if applied.clipped {
                report.clipped += 1;
                self.note_clip(ch);
            } else {
                self.clip_streak[ch] = 0;
            }
        }

        self.stats.ticks += 1;
        if self.diagnostics.debug_level >= DebugLevel::Stats
            && self.stats.ticks % u64::from(self.diagnostics.stats_interval_ticks) == 0
        {
            let s = self.stats();
            tracing::info!(
                ticks = s.ticks,
                calibrated = s.calibrated,
                staged = s.staged,
                clipping = s.clipping,
                writes = s.writes,
                skipped_writes = s.skipped_writes,
                failed_writes = s.failed_writes,
                "calibration stats"
            );
        }
        report
    }

    /// Write the active table, subject to the rate limiter unless `force`.
    ///
    /// A failed write leaves the timestamp untouched so the next request retries.
    pub fn write_storage(&mut self, force: bool) -> WriteOutcome {
        let now = self.clock.ms_since(self.epoch);
        if !self.gate.permits(now, force) {
            self.stats.skipped_writes += 1;
            let remaining_ms = self.gate.remaining_ms(now);
            if self.diagnostics.debug_level >= DebugLevel::Events {
                tracing::info!(remaining_ms, "calibration write rate limited");
            }
            return WriteOutcome::Skipped { remaining_ms };
        }
        match self.storage.store(&self.active) {
            Ok(()) => {
                self.gate.mark_written(now);
                self.stats.writes += 1;
                if self.diagnostics.debug_level >= DebugLevel::Events {
                    tracing::info!(force, "calibration written");
                }
                WriteOutcome::Written
            }
            Err(e) => {
                let err = map_storage_error(&*e);
                self.stats.failed_writes += 1;
                tracing::warn!(error = %err, force, "calibration write failed");
                WriteOutcome::Failed(err)
            }
        }
    }

    /// Restore defaults on every channel and force a write, as a reset edge does.
    pub fn reset_to_defaults(&mut self) -> WriteOutcome {
        self.clear_calibration();
        self.write_storage(true)
    }

    /// Overwrite the latch levels without generating edges.
    ///
    /// Runners call this with the first switch read so a switch held at
    /// power-up is ignored until it is released and pressed again.
    pub fn seed_switches(&mut self, switches: SwitchState) {
        self.freeze = EdgeLatch::new(switches.freeze);
        self.reset = EdgeLatch::new(switches.reset);
    }

    // ── Introspection ────────────────────────────────────────────────────────

    /// Calibration currently applied to output.
    pub fn active(&self, channel: usize) -> GainOffset {
        self.active[channel]
    }

    pub fn table(&self) -> &[GainOffset; N] {
        &self.active
    }

    /// Candidate calibration awaiting a freeze edge.
    pub fn staged(&self, channel: usize) -> Option<GainOffset> {
        self.staged[channel]
    }

    /// Observed `(min, max)` of the filtered signal since the last commit.
    pub fn range(&self, channel: usize) -> Option<(f32, f32)> {
        self.ranges.range(channel)
    }

    pub fn source(&self) -> TableSource {
        self.source
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn stats(&self) -> EngineStats {
        let default_pair = self.calibration.default_pair();
        EngineStats {
            calibrated: self.active.iter().filter(|c| **c != default_pair).count(),
            staged: self.staged.iter().filter(|s| s.is_some()).count(),
            clipping: self.clip_streak.iter().filter(|n| **n > 0).count(),
            ..self.stats
        }
    }

    // ── Private ──────────────────────────────────────────────────────────────

    fn restage(&mut self, ch: usize) {
        let range = self.ranges.range(ch);
        if let Some(staged) = staging::try_build(range, self.calibration.threshold, &self.params) {
            if self.diagnostics.debug_level >= DebugLevel::Verbose && self.staged[ch].is_none() {
                tracing::debug!(
                    channel = ch,
                    span = self.ranges.span(ch).unwrap_or(0.0),
                    gain = staged.gain,
                    offset = staged.offset,
                    "channel staged"
                );
            }
            self.staged[ch] = Some(staged);
        }
    }

    /// Move every staged pair into the active table and restart those
    /// channels' ranges. Returns the number of channels committed.
    fn commit_staged(&mut self) -> usize {
        let mut committed = 0;
        for ch in 0..N {
            if let Some(staged) = self.staged[ch].take() {
                self.active[ch] = staged;
                self.ranges.clear(ch);
                committed += 1;
                if self.diagnostics.debug_level >= DebugLevel::Verbose {
                    tracing::debug!(
                        channel = ch,
                        gain = staged.gain,
                        offset = staged.offset,
                        "channel committed"
                    );
                }
            }
        }
        if committed > 0 {
            self.stats.commits += 1;
        }
        committed
    }

    fn clear_calibration(&mut self) {
        self.active = [self.calibration.default_pair(); N];
        self.staged = [None; N];
        self.ranges.clear_all();
        self.clip_streak = [0; N];
        self.stats.resets += 1;
    }

    fn note_clip(&mut self, ch: usize) {
        self.clip_streak[ch] = self.clip_streak[ch].saturating_add(1);
        let warn_at = self.diagnostics.clip_warn_ticks;
        if warn_at > 0
            && self.clip_streak[ch] == warn_at
            && self.diagnostics.debug_level >= DebugLevel::Verbose
        {
            tracing::debug!(
                channel = ch,
                ticks = warn_at,
                filtered = self.filtered[ch],
                "output pinned at a bound; channel may need recalibration"
            );
        }
    }
}
