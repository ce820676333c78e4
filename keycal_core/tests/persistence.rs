//! Write rate limiting and storage failure handling.

use keycal_core::mocks::MemoryStorage;
use keycal_core::{
    CalError, CalibrationCfg, CalibrationEngine, GainOffset, PersistenceCfg, SwitchState,
    TickReport, WriteOutcome,
};
use keycal_traits::ManualClock;
use rstest::rstest;
use std::time::Duration;

fn engine(
    storage: MemoryStorage,
    clock: &ManualClock,
    interval_ms: u64,
) -> CalibrationEngine<MemoryStorage, 1> {
    CalibrationEngine::builder(storage)
        .with_calibration(CalibrationCfg {
            threshold: 100.0,
            ..CalibrationCfg::default()
        })
        .with_persistence(PersistenceCfg {
            min_write_interval_ms: interval_ms,
        })
        .with_clock(Box::new(clock.clone()))
        .setup()
        .unwrap()
}

/// Sweep 0..hi so the channel stages, then produce a freeze edge.
fn sweep_and_freeze(e: &mut CalibrationEngine<MemoryStorage, 1>, hi: f32) -> TickReport {
    let mut out = [0.0; 1];
    let idle = SwitchState::default();
    for v in [0.0, 0.0, 0.0, 0.0, hi, hi, hi, hi] {
        e.tick(&[v], idle, &mut out);
    }
    e.tick(
        &[hi],
        SwitchState {
            freeze: true,
            reset: false,
        },
        &mut out,
    )
}

#[test]
fn freeze_inside_interval_commits_but_skips_write() {
    let clock = ManualClock::new();
    let mut e = engine(MemoryStorage::default(), &clock, 10_000);

    assert_eq!(sweep_and_freeze(&mut e, 1000.0).write, Some(WriteOutcome::Written));
    let first = e.active(0);

    clock.advance(Duration::from_millis(1_000));
    let r = sweep_and_freeze(&mut e, 2000.0);
    assert_eq!(r.committed, 1);
    assert_eq!(r.write, Some(WriteOutcome::Skipped { remaining_ms: 9_000 }));
    assert_eq!(e.storage().writes, 1);
    // Committed regardless; storage still holds the first table.
    assert_ne!(e.active(0), first);
    assert_eq!(e.storage().stored.as_deref(), Some(&[first][..]));

    clock.advance(Duration::from_millis(9_000));
    assert_eq!(sweep_and_freeze(&mut e, 1000.0).write, Some(WriteOutcome::Written));
    assert_eq!(e.storage().writes, 2);
    assert_eq!(e.stats().skipped_writes, 1);
}

#[rstest]
#[case(0, true)]
#[case(500, true)]
#[case(501, false)]
fn interval_boundary(#[case] interval_ms: u64, #[case] written: bool) {
    let clock = ManualClock::new();
    let mut e = engine(MemoryStorage::default(), &clock, interval_ms);
    sweep_and_freeze(&mut e, 1000.0);
    clock.advance(Duration::from_millis(500));
    let r = sweep_and_freeze(&mut e, 1000.0);
    assert_eq!(matches!(r.write, Some(WriteOutcome::Written)), written);
}

#[test]
fn failed_write_keeps_active_table_and_allows_retry() {
    let clock = ManualClock::new();
    let mut e = engine(
        MemoryStorage {
            fail_writes: true,
            ..MemoryStorage::default()
        },
        &clock,
        10_000,
    );

    let r = sweep_and_freeze(&mut e, 1000.0);
    assert!(matches!(r.write, Some(WriteOutcome::Failed(CalError::Storage(_)))));
    assert_ne!(e.active(0), GainOffset::new(1.0, 0.0));
    assert_eq!(e.stats().failed_writes, 1);

    // A failure does not start the interval; the next request goes through.
    e.storage_mut().fail_writes = false;
    clock.advance(Duration::from_millis(10));
    assert_eq!(sweep_and_freeze(&mut e, 1000.0).write, Some(WriteOutcome::Written));
    assert_eq!(e.storage().writes, 1);
}

#[test]
fn explicit_write_is_rate_limited_unless_forced() {
    let clock = ManualClock::new();
    let mut e = engine(MemoryStorage::default(), &clock, 10_000);
    assert_eq!(e.write_storage(false), WriteOutcome::Written);
    assert!(matches!(e.write_storage(false), WriteOutcome::Skipped { .. }));
    assert_eq!(e.write_storage(true), WriteOutcome::Written);
    assert_eq!(e.storage().writes, 2);
}

#[test]
fn reset_to_defaults_writes_default_table() {
    let clock = ManualClock::new();
    let mut e = engine(MemoryStorage::default(), &clock, 10_000);
    sweep_and_freeze(&mut e, 1000.0);
    assert_eq!(e.reset_to_defaults(), WriteOutcome::Written);
    assert_eq!(
        e.storage().stored.as_deref(),
        Some(&[GainOffset::new(1.0, 0.0)][..])
    );
    assert_eq!(e.stats().resets, 1);
}
