//! End-to-end calibration flow: sweep, stage, freeze, apply.

use keycal_core::mocks::MemoryStorage;
use keycal_core::{
    CalibrationCfg, CalibrationEngine, GainOffset, PersistenceCfg, SwitchState, TableSource,
    TickReport, WriteOutcome,
};
use keycal_traits::ManualClock;

const IDLE: SwitchState = SwitchState {
    freeze: false,
    reset: false,
};
const FREEZE: SwitchState = SwitchState {
    freeze: true,
    reset: false,
};

fn cfg() -> CalibrationCfg {
    CalibrationCfg {
        default_gain: 1.0,
        threshold: 500.0,
        match_gain: 1.0,
        match_offset: 0.0,
        reference: GainOffset::new(1.0, 0.0),
        warmup_ticks: 0,
    }
}

fn engine(storage: MemoryStorage) -> CalibrationEngine<MemoryStorage, 2> {
    CalibrationEngine::builder(storage)
        .with_calibration(cfg())
        .with_persistence(PersistenceCfg {
            min_write_interval_ms: 10_000,
        })
        .with_clock(Box::new(ManualClock::new()))
        .setup()
        .unwrap()
}

fn feed(e: &mut CalibrationEngine<MemoryStorage, 2>, frame: [f32; 2], n: usize) -> [f32; 2] {
    let mut out = [0.0; 2];
    for _ in 0..n {
        e.tick(&frame, IDLE, &mut out);
    }
    out
}

fn press_freeze(e: &mut CalibrationEngine<MemoryStorage, 2>, frame: [f32; 2]) -> TickReport {
    let mut out = [0.0; 2];
    e.tick(&frame, IDLE, &mut out);
    e.tick(&frame, FREEZE, &mut out)
}

#[test]
fn sweep_then_freeze_normalizes_output() {
    let mut e = engine(MemoryStorage::default());
    feed(&mut e, [100.0, 100.0], 4);
    feed(&mut e, [900.0, 150.0], 4);

    assert!(e.staged(0).is_some());
    assert_eq!(e.staged(1), None, "span 50 is below the threshold");
    // Staging alone never touches the output table.
    assert_eq!(e.active(0), GainOffset::new(1.0, 0.0));

    let report = press_freeze(&mut e, [900.0, 150.0]);
    assert_eq!(report.committed, 1);
    assert!(report.changed);
    assert_eq!(report.write, Some(WriteOutcome::Written));
    assert_eq!(e.storage().writes, 1);

    let a = e.active(0);
    assert!((a.gain - 1.0 / 800.0).abs() < 1e-7);
    assert!((a.offset + 100.0 / 800.0).abs() < 1e-6);
    assert_eq!(e.active(1), GainOffset::new(1.0, 0.0));
    assert_eq!(e.staged(0), None);

    let out = feed(&mut e, [500.0, 150.0], 4);
    assert!((out[0] - 0.5).abs() < 1e-5, "got {}", out[0]);
    // Uncalibrated channel: 1.0 * 150 clamps to the top.
    assert_eq!(out[1], 1.0);
    assert_eq!(e.stats().calibrated, 1);
}

#[test]
fn stored_table_matches_active_after_write() {
    let mut e = engine(MemoryStorage::default());
    feed(&mut e, [0.0, 0.0], 4);
    feed(&mut e, [1000.0, 1000.0], 4);
    press_freeze(&mut e, [1000.0, 1000.0]);
    let stored = e.storage().stored.clone().unwrap();
    assert_eq!(stored.as_slice(), e.table().as_slice());
}

#[test]
fn freeze_without_staged_channels_does_not_write() {
    let mut e = engine(MemoryStorage::default());
    feed(&mut e, [10.0, 10.0], 4);
    let report = press_freeze(&mut e, [10.0, 10.0]);
    assert_eq!(report.committed, 0);
    assert!(!report.changed);
    assert_eq!(report.write, None);
    assert_eq!(e.storage().writes, 0);
}

#[test]
fn held_freeze_commits_once() {
    let mut e = engine(MemoryStorage::default());
    feed(&mut e, [0.0, 0.0], 4);
    feed(&mut e, [1000.0, 0.0], 4);
    let mut out = [0.0; 2];
    let first = e.tick(&[1000.0, 0.0], FREEZE, &mut out);
    assert_eq!(first.committed, 1);
    // Keep sweeping while the switch is held: stages again, but no edge.
    for v in [0.0, 0.0, 0.0, 0.0, 2000.0, 2000.0, 2000.0, 2000.0] {
        let r = e.tick(&[v, 0.0], FREEZE, &mut out);
        assert_eq!(r.committed, 0);
    }
    assert!(e.staged(0).is_some());
    assert_eq!(e.storage().writes, 1);
}

#[test]
fn reset_restores_defaults_and_forces_write() {
    let mut e = engine(MemoryStorage::default());
    feed(&mut e, [0.0, 0.0], 4);
    feed(&mut e, [1000.0, 1000.0], 4);
    press_freeze(&mut e, [1000.0, 1000.0]);
    assert_eq!(e.storage().writes, 1);

    let mut out = [0.0; 2];
    let report = e.tick(
        &[1000.0, 1000.0],
        SwitchState {
            freeze: false,
            reset: true,
        },
        &mut out,
    );
    assert!(report.reset);
    // Forced: the interval since the last write has not elapsed.
    assert_eq!(report.write, Some(WriteOutcome::Written));
    assert_eq!(e.storage().writes, 2);
    for ch in 0..2 {
        assert_eq!(e.active(ch), GainOffset::new(1.0, 0.0));
        assert_eq!(e.staged(ch), None);
        assert_eq!(e.range(ch), None);
    }
    let stored = e.storage().stored.clone().unwrap();
    assert!(stored.iter().all(|c| *c == GainOffset::new(1.0, 0.0)));
}

#[test]
fn valid_stored_table_is_loaded() {
    let table = vec![GainOffset::new(0.5, -0.1), GainOffset::new(2.0, 0.2)];
    let e = engine(MemoryStorage::with_table(table.clone()));
    assert_eq!(e.source(), TableSource::Storage);
    assert_eq!(e.table().as_slice(), table.as_slice());
}

#[test]
fn invalid_stored_tables_fall_back_to_defaults() {
    let short = engine(MemoryStorage::with_table(vec![GainOffset::new(1.0, 0.0)]));
    assert_eq!(short.source(), TableSource::Defaults);

    let zero_gain = engine(MemoryStorage::with_table(vec![
        GainOffset::new(0.0, 0.0),
        GainOffset::new(1.0, 0.0),
    ]));
    assert_eq!(zero_gain.source(), TableSource::Defaults);
    assert_eq!(zero_gain.active(0), GainOffset::new(1.0, 0.0));

    let failing = engine(MemoryStorage {
        fail_loads: true,
        ..MemoryStorage::default()
    });
    assert_eq!(failing.source(), TableSource::Defaults);
}

#[test]
fn switch_held_at_power_up_is_ignored() {
    let mut e: CalibrationEngine<MemoryStorage, 2> =
        CalibrationEngine::builder(MemoryStorage::default())
            .with_calibration(cfg())
            .with_initial_switches(FREEZE)
            .setup()
            .unwrap();
    let mut out = [0.0; 2];
    for v in [0.0, 0.0, 0.0, 0.0, 1000.0, 1000.0, 1000.0, 1000.0] {
        let r = e.tick(&[v, v], FREEZE, &mut out);
        assert_eq!(r.committed, 0);
    }
    let r = press_freeze(&mut e, [1000.0, 1000.0]);
    assert_eq!(r.committed, 2);
}

#[test]
fn narrow_channel_stays_default_across_many_freezes() {
    let mut e = engine(MemoryStorage::default());
    let default_pair = GainOffset::new(1.0, 0.0);
    for round in 0..5 {
        let hi = 900.0 + 100.0 * round as f32;
        feed(&mut e, [100.0, 100.0], 4);
        feed(&mut e, [hi, 150.0], 4);
        let report = press_freeze(&mut e, [hi, 150.0]);
        assert_eq!(report.committed, 1, "round {round}");
        assert_eq!(e.active(1), default_pair, "round {round}");
        assert_eq!(e.staged(1), None, "round {round}");
    }
}

#[test]
fn held_key_behind_non_finite_first_sample_is_not_calibrated() {
    let mut e = engine(MemoryStorage::default());
    let mut out = [0.0; 2];
    e.tick(&[f32::NAN, f32::INFINITY], IDLE, &mut out);
    assert_eq!(e.range(0), None);
    feed(&mut e, [600.0, 600.0], 8);
    assert_eq!(e.range(0), Some((600.0, 600.0)));
    assert_eq!(e.staged(0), None);

    let report = press_freeze(&mut e, [600.0, 600.0]);
    assert_eq!(report.committed, 0);
    assert_eq!(e.active(0), GainOffset::new(1.0, 0.0));
    assert_eq!(e.active(1), GainOffset::new(1.0, 0.0));
}

#[test]
fn default_match_places_unit_range_inside_window() {
    let mut e: CalibrationEngine<MemoryStorage, 2> =
        CalibrationEngine::builder(MemoryStorage::default())
            .with_calibration(CalibrationCfg {
                match_gain: 0.75,
                match_offset: 0.25,
                ..cfg()
            })
            .with_clock(Box::new(ManualClock::new()))
            .setup()
            .unwrap();
    feed(&mut e, [100.0, 100.0], 4);
    feed(&mut e, [900.0, 150.0], 4);
    press_freeze(&mut e, [900.0, 150.0]);

    // gain = g_ref * m_g / span, offset = g_ref * (m_g * -min / span + m_o) + o_ref
    let a = e.active(0);
    assert!((a.gain - 0.75 / 800.0).abs() < 1e-8, "gain {}", a.gain);
    assert!((a.offset - (0.75 * -0.125 + 0.25)).abs() < 1e-6, "offset {}", a.offset);
    assert_eq!(e.active(1), GainOffset::new(1.0, 0.0));

    // The observed range maps onto [0.25, 1.0].
    let out = feed(&mut e, [100.0, 150.0], 4);
    assert!((out[0] - 0.25).abs() < 1e-5, "min -> {}", out[0]);
    let out = feed(&mut e, [500.0, 150.0], 4);
    assert!((out[0] - 0.625).abs() < 1e-5, "mid -> {}", out[0]);
    let out = feed(&mut e, [900.0, 150.0], 4);
    assert!((out[0] - 1.0).abs() < 1e-5, "max -> {}", out[0]);
}
