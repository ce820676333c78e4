//! Candidate calibration derived from an observed range.
//!
//! The unit mapping sends the observed `[min, max]` onto `[0, 1]`:
//!
//!   g_u = 1 / (max - min)
//!   o_u = -min / (max - min)
//!
//! The relative match then places that unit interval inside the match window
//! and expresses the result against the reference ("orig") pair:
//!
//!   staged(x) = g_ref * (m_g * (g_u * x + o_u) + m_o) + o_ref
//!
//! so
//!
//!   gain   = g_ref * m_g * g_u
//!   offset = g_ref * (m_g * o_u + m_o) + o_ref
//!
//! For `m_g > 0` and `g_ref > 0` this is monotonic and invertible, and the
//! ratio `gain / g_ref` is the same multiple `m_g` of the unit gain on every
//! channel.

use keycal_traits::GainOffset;

use crate::config::CalibrationCfg;

/// Relative-match parameters, copied out of `CalibrationCfg` at setup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchParams {
    pub match_gain: f32,
    pub match_offset: f32,
    pub reference: GainOffset,
}

impl MatchParams {
    /// `g_ref * m_g`, the single scale applied to every unit gain.
    #[inline]
    pub fn staged_scaling(&self) -> f32 {
        self.reference.gain * self.match_gain
    }
}

impl From<&CalibrationCfg> for MatchParams {
    fn from(c: &CalibrationCfg) -> Self {
        Self {
            match_gain: c.match_gain,
            match_offset: c.match_offset,
            reference: c.reference,
        }
    }
}

/// Mapping of `[min, max]` onto `[0, 1]`. `max` must exceed `min`.
#[inline]
pub fn unit_mapping(min: f32, max: f32) -> GainOffset {
    let gain = 1.0 / (max - min);
    GainOffset::new(gain, -min * gain)
}

#[inline]
pub fn relative_match(unit: GainOffset, params: &MatchParams) -> GainOffset {
    let g_ref = params.reference.gain;
    GainOffset::new(
        params.staged_scaling() * unit.gain,
        g_ref * (params.match_gain * unit.offset + params.match_offset) + params.reference.offset,
    )
}

/// Stage a calibration for an observed range, or decline.
///
/// Declines when the range is unknown, narrower than `threshold`, or the
/// result is not finite. `threshold` is positive, so an accepted span is never
/// zero.
#[inline]
pub fn try_build(range: Option<(f32, f32)>, threshold: f32, params: &MatchParams) -> Option<GainOffset> {
    let (min, max) = range?;
    if max - min < threshold {
        return None;
    }
    let staged = relative_match(unit_mapping(min, max), params);
    (staged.gain.is_finite() && staged.offset.is_finite() && staged.gain != 0.0).then_some(staged)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY: MatchParams = MatchParams {
        match_gain: 1.0,
        match_offset: 0.0,
        reference: GainOffset::new(1.0, 0.0),
    };

    fn eval(c: GainOffset, x: f32) -> f32 {
        c.gain * x + c.offset
    }

    #[test]
    fn unit_mapping_sends_extremes_to_zero_and_one() {
        let u = unit_mapping(100.0, 900.0);
        assert!((eval(u, 100.0)).abs() < 1e-6);
        assert!((eval(u, 900.0) - 1.0).abs() < 1e-6);
        assert!((eval(u, 500.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn identity_match_keeps_unit_mapping() {
        let staged = try_build(Some((100.0, 900.0)), 500.0, &IDENTITY).unwrap();
        assert!((staged.gain - 1.0 / 800.0).abs() < 1e-9);
        assert!((staged.offset + 100.0 * staged.gain).abs() < 1e-6);
    }

    #[test]
    fn match_window_places_range_inside_output() {
        let params = MatchParams {
            match_gain: 0.75,
            match_offset: 0.25,
            reference: GainOffset::new(1.0, 0.0),
        };
        let staged = try_build(Some((0.2, 0.9)), 0.6, &params).unwrap();
        assert!((eval(staged, 0.2) - 0.25).abs() < 1e-6);
        assert!((eval(staged, 0.9) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn gain_ratio_to_reference_is_the_match_gain() {
        let params = MatchParams {
            match_gain: 0.5,
            match_offset: 0.1,
            reference: GainOffset::new(2.0, 0.3),
        };
        for (lo, hi) in [(0.0, 1.0), (10.0, 30.0), (-4.0, 4.0)] {
            let staged = try_build(Some((lo, hi)), 0.5, &params).unwrap();
            let unit = unit_mapping(lo, hi);
            let ratio = staged.gain / params.reference.gain;
            assert!((ratio - params.match_gain * unit.gain).abs() < 1e-6);
        }
    }

    #[test]
    fn declines_below_threshold_or_unknown() {
        assert_eq!(try_build(None, 0.1, &IDENTITY), None);
        assert_eq!(try_build(Some((0.0, 0.05)), 0.1, &IDENTITY), None);
        assert!(try_build(Some((0.0, 0.1)), 0.1, &IDENTITY).is_some());
    }
}
