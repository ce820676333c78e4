use crate::engine::CalibrationEngine;
use crate::error::{CalError, Result as CoreResult};
use crate::hw_error::map_sensor_error;
use crate::persistence::WriteOutcome;
use crate::sampler::FrameSampler;
use crate::config::SamplingCfg;
use crate::status::TickReport;
use keycal_traits::clock::{Clock, MonotonicClock};
use keycal_traits::{SensorArray, Storage, SwitchBank, SwitchState};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// How frames reach the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    /// Read inside the tick loop with `SensorArray::read(timeout)`.
    Direct,
    /// A `FrameSampler` thread reads at the sample period; the loop takes the
    /// latest frame.
    Sampled,
}

#[derive(Debug, Clone)]
pub struct RunParams {
    pub ticks: u64,
    pub mode: SamplingMode,
    pub sampling: SamplingCfg,
    /// Sleep one sample period between direct-mode ticks.
    pub pace: bool,
    /// Checked once per tick; when set the run stops early.
    pub shutdown: Option<Arc<AtomicBool>>,
}

impl RunParams {
    pub fn new(ticks: u64) -> Self {
        Self {
            ticks,
            mode: SamplingMode::Direct,
            sampling: SamplingCfg::default(),
            pace: true,
            shutdown: None,
        }
    }
}

/// Totals for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    /// Ticks on which the active table changed.
    pub changes: u64,
    pub writes: u64,
    pub skipped_writes: u64,
    pub failed_writes: u64,
    /// Frames that could not be read; those ticks are skipped.
    pub sensor_errors: u64,
    pub switch_errors: u64,
    pub interrupted: bool,
}

impl RunSummary {
    /// Fold one tick's report into the totals.
    pub fn record(&mut self, report: &TickReport) {
        self.ticks += 1;
        if report.changed {
            self.changes += 1;
        }
        match report.write {
            Some(WriteOutcome::Written) => self.writes += 1,
            Some(WriteOutcome::Skipped { .. }) => self.skipped_writes += 1,
            Some(WriteOutcome::Failed(_)) => self.failed_writes += 1,
            None => {}
        }
    }
}

/// Longest gap without a good frame before the run aborts with a timeout.
///
/// Four sensor timeouts, but never less than two tick periods so a single
/// missed frame is tolerated.
#[inline]
fn stall_threshold_ms(sensor_timeout_ms: u64, period: Duration) -> u64 {
    let fast = sensor_timeout_ms.saturating_mul(4);
    let period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX).max(1);
    fast.max(period_ms.saturating_mul(2)).max(1)
}

fn is_shutdown(flag: Option<&Arc<AtomicBool>>) -> bool {
    flag.is_some_and(|f| f.load(Ordering::Relaxed))
}

/// Read switches, keeping the previous levels if the bank fails.
fn poll_switches<B: SwitchBank>(bank: &mut B, last: &mut SwitchState, summary: &mut RunSummary) {
    match bank.read_switches() {
        Ok(s) => *last = s,
        Err(e) => {
            summary.switch_errors += 1;
            tracing::debug!(error = %e, "switch read failed; holding previous levels");
        }
    }
}

/// Drive `engine` for up to `params.ticks` ticks.
///
/// The first switch read seeds the edge latches. `on_frame` sees each tick's
/// outputs and report. Fails only when no frame arrives for longer than the
/// stall threshold.
pub fn run_ticks<S, A, B, C, F, const N: usize>(
    engine: &mut CalibrationEngine<S, N>,
    sensors: A,
    switches: &mut B,
    params: &RunParams,
    clock: &C,
    on_frame: F,
) -> CoreResult<RunSummary>
where
    S: Storage,
    A: SensorArray + Send + 'static,
    B: SwitchBank,
    C: Clock + ?Sized,
    F: FnMut(u64, &[f32; N], &TickReport),
{
    let period = crate::util::tick_period(params.sampling.sample_period_us);
    tracing::info!(
        ticks = params.ticks,
        mode = ?params.mode,
        period_us = params.sampling.sample_period_us,
        channels = N,
        "run start"
    );
    let summary = match params.mode {
        SamplingMode::Direct => run_direct(engine, sensors, switches, params, clock, period, on_frame),
        SamplingMode::Sampled => run_sampled(engine, sensors, switches, params, period, on_frame),
    }?;
    tracing::info!(
        ticks = summary.ticks,
        changes = summary.changes,
        writes = summary.writes,
        skipped_writes = summary.skipped_writes,
        failed_writes = summary.failed_writes,
        sensor_errors = summary.sensor_errors,
        interrupted = summary.interrupted,
        "run complete"
    );
    Ok(summary)
}

fn run_direct<S, A, B, C, F, const N: usize>(
    engine: &mut CalibrationEngine<S, N>,
    mut sensors: A,
    switches: &mut B,
    params: &RunParams,
    clock: &C,
    period: Duration,
    mut on_frame: F,
) -> CoreResult<RunSummary>
where
    S: Storage,
    A: SensorArray,
    B: SwitchBank,
    C: Clock + ?Sized,
    F: FnMut(u64, &[f32; N], &TickReport),
{
    let mut summary = RunSummary::default();
    let mut levels = SwitchState::default();
    poll_switches(switches, &mut levels, &mut summary);
    engine.seed_switches(levels);

    let timeout = Duration::from_millis(params.sampling.sensor_timeout_ms);
    let stall_ms = stall_threshold_ms(params.sampling.sensor_timeout_ms, period);
    let epoch = clock.now();
    let mut last_ok_ms = 0_u64;
    let mut raw = [0.0_f32; N];
    let mut out = [0.0_f32; N];

    for i in 0..params.ticks {
        if is_shutdown(params.shutdown.as_ref()) {
            summary.interrupted = true;
            break;
        }
        match sensors.read(&mut raw, timeout) {
            Ok(()) => {
                last_ok_ms = clock.ms_since(epoch);
                poll_switches(switches, &mut levels, &mut summary);
                let report = engine.tick(&raw, levels, &mut out);
                summary.record(&report);
                on_frame(i, &out, &report);
            }
            Err(e) => {
                summary.sensor_errors += 1;
                let err = map_sensor_error(&*e);
                tracing::debug!(error = %err, tick = i, "sensor read failed; tick skipped");
                let stalled = clock.ms_since(epoch).saturating_sub(last_ok_ms);
                if stalled > stall_ms {
                    tracing::error!(stalled_ms = stalled, "sensor stalled");
                    return Err(crate::error::Report::new(CalError::Timeout));
                }
            }
        }
        if params.pace {
            clock.sleep(period);
        }
    }
    Ok(summary)
}

fn run_sampled<S, A, B, F, const N: usize>(
    engine: &mut CalibrationEngine<S, N>,
    sensors: A,
    switches: &mut B,
    params: &RunParams,
    period: Duration,
    mut on_frame: F,
) -> CoreResult<RunSummary>
where
    S: Storage,
    A: SensorArray + Send + 'static,
    B: SwitchBank,
    F: FnMut(u64, &[f32; N], &TickReport),
{
    let mut summary = RunSummary::default();
    let mut levels = SwitchState::default();
    poll_switches(switches, &mut levels, &mut summary);
    engine.seed_switches(levels);

    let timeout = Duration::from_millis(params.sampling.sensor_timeout_ms);
    let stall_ms = stall_threshold_ms(params.sampling.sensor_timeout_ms, period);
    // The sampler paces itself in real time, so stalls are measured on the same clock.
    let sampler: FrameSampler<N> = FrameSampler::spawn(sensors, period, timeout, MonotonicClock::new());
    let mut out = [0.0_f32; N];
    let wait = timeout.max(period.saturating_mul(2));

    let mut i = 0;
    while i < params.ticks {
        if is_shutdown(params.shutdown.as_ref()) {
            summary.interrupted = true;
            break;
        }
        let Some(raw) = sampler.recv_timeout(wait) else {
            let stalled = sampler.stalled_for_now();
            if stalled > stall_ms {
                summary.sensor_errors = sampler.errors();
                tracing::error!(stalled_ms = stalled, "sampler stalled");
                return Err(crate::error::Report::new(CalError::Timeout));
            }
            continue;
        };
        poll_switches(switches, &mut levels, &mut summary);
        let report = engine.tick(&raw, levels, &mut out);
        summary.record(&report);
        on_frame(i, &out, &report);
        i += 1;
    }
    summary.sensor_errors = sampler.errors();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::stall_threshold_ms;
    use std::time::Duration;

    #[test]
    fn stall_threshold_is_four_timeouts() {
        assert_eq!(stall_threshold_ms(5, Duration::from_micros(300)), 20);
        assert_eq!(stall_threshold_ms(150, Duration::from_millis(10)), 600);
    }

    #[test]
    fn stall_threshold_spans_two_periods() {
        assert_eq!(stall_threshold_ms(1, Duration::from_millis(100)), 200);
    }

    #[test]
    fn stall_threshold_is_at_least_one_ms() {
        assert_eq!(stall_threshold_ms(0, Duration::ZERO), 2);
    }
}
