use keycal_core::filter::{FILTER_SAMPLES, RingFilter};
use keycal_core::mocks::MemoryStorage;
use keycal_core::switch::EdgeLatch;
use keycal_core::{CalibrationCfg, CalibrationEngine, GainOffset, SwitchState, clip_limit};
use proptest::prelude::*;

prop_compose! {
    fn frames_strategy()(
        frames in prop::collection::vec(prop::array::uniform3(-5000.0f32..5000.0), 1..300),
        switches in prop::collection::vec((any::<bool>(), any::<bool>()), 300),
    ) -> Vec<([f32; 3], SwitchState)> {
        frames
            .into_iter()
            .zip(switches)
            .map(|(f, (freeze, reset))| (f, SwitchState { freeze, reset }))
            .collect()
    }
}

proptest! {
    #[test]
    fn clamp_is_total(y in any::<f32>()) {
        let a = clip_limit(y);
        prop_assert!((0.0..=1.0).contains(&a.value));
        prop_assert_eq!(a.clipped, !(0.0..=1.0).contains(&y));
    }

    #[test]
    fn moving_average_stays_within_last_window(xs in prop::collection::vec(-1.0e4f32..1.0e4, 1..100)) {
        let mut f: RingFilter<1> = RingFilter::new();
        for (i, &x) in xs.iter().enumerate() {
            let y = f.filter(0, x).expect("finite input primes the ring");
            f.advance();
            // Before K samples the ring is padded with copies of the first one.
            let window = &xs[(i + 1).saturating_sub(FILTER_SAMPLES)..=i];
            let lo = window.iter().copied().fold(f32::INFINITY, f32::min);
            let hi = window.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            prop_assert!(y >= lo - 1e-2 && y <= hi + 1e-2, "y={} lo={} hi={} at {}", y, lo, hi, i);
        }
    }

    #[test]
    fn held_level_yields_one_edge(n in 1usize..50, initial in any::<bool>()) {
        let mut l = EdgeLatch::new(initial);
        let edges = (0..n).filter(|_| l.rising(true)).count();
        prop_assert_eq!(edges, usize::from(!initial));
    }

    #[test]
    fn engine_output_always_in_range(frames in frames_strategy()) {
        let mut e: CalibrationEngine<MemoryStorage, 3> = CalibrationEngine::builder(MemoryStorage::default())
            .with_calibration(CalibrationCfg { threshold: 10.0, ..CalibrationCfg::default() })
            .setup()
            .unwrap();
        let mut out = [0.0; 3];
        for (raw, sw) in frames {
            e.tick(&raw, sw, &mut out);
            prop_assert!(out.iter().all(|y| (0.0..=1.0).contains(y)));
            for ch in 0..3 {
                let c = e.active(ch);
                prop_assert!(c.gain.is_finite() && c.gain != 0.0 && c.offset.is_finite());
                if let Some((lo, hi)) = e.range(ch) {
                    prop_assert!(lo <= hi);
                }
            }
        }
    }

    #[test]
    fn staged_gain_scales_with_inverse_span(lo in -1000.0f32..1000.0, span in 1.0f32..5000.0) {
        let params = keycal_core::staging::MatchParams {
            match_gain: 0.75,
            match_offset: 0.25,
            reference: GainOffset::new(1.0, 0.0),
        };
        let c = keycal_core::staging::try_build(Some((lo, lo + span)), 0.6, &params).unwrap();
        prop_assert!((c.gain * span - 0.75).abs() < 1e-3);
        // The observed range lands inside the match window [0.25, 1.0].
        let at_lo = c.gain * lo + c.offset;
        let at_hi = c.gain * (lo + span) + c.offset;
        prop_assert!((at_lo - 0.25).abs() < 1e-2);
        prop_assert!((at_hi - 1.0).abs() < 1e-2);
    }
}
