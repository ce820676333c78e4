//! Apply a calibration to a filtered reading and clamp to the canonical range.

use keycal_traits::GainOffset;

/// Lower bound of every normalized output.
pub const OUTPUT_MIN: f32 = 0.0;
/// Upper bound of every normalized output.
pub const OUTPUT_MAX: f32 = 1.0;

/// Result of applying a calibration to one reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Applied {
    pub value: f32,
    /// True when `gain * x + offset` fell outside the canonical range.
    pub clipped: bool,
}

/// Clamp to `[OUTPUT_MIN, OUTPUT_MAX]`. NaN maps to `OUTPUT_MIN`.
#[inline]
pub fn clip_limit(y: f32) -> Applied {
    if y.is_nan() {
        Applied {
            value: OUTPUT_MIN,
            clipped: true,
        }
    } else if y < OUTPUT_MIN {
        Applied {
            value: OUTPUT_MIN,
            clipped: true,
        }
    } else if y > OUTPUT_MAX {
        Applied {
            value: OUTPUT_MAX,
            clipped: true,
        }
    } else {
        Applied {
            value: y,
            clipped: false,
        }
    }
}

#[inline]
pub fn apply(cal: GainOffset, filtered: f32) -> Applied {
    clip_limit(cal.gain * filtered + cal.offset)
}

/// A stored table is usable when it has one finite, non-zero-gain entry per channel.
pub fn is_valid_table(table: &[GainOffset], channels: usize) -> bool {
    table.len() == channels
        && table
            .iter()
            .all(|c| c.gain.is_finite() && c.offset.is_finite() && c.gain != 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_range_passes_through() {
        let a = apply(GainOffset::new(1.0 / 800.0, -100.0 / 800.0), 500.0);
        assert!((a.value - 0.5).abs() < 1e-6);
        assert!(!a.clipped);
    }

    #[test]
    fn out_of_range_is_clamped() {
        let cal = GainOffset::new(2.0, -0.5);
        assert_eq!(apply(cal, 10.0), Applied { value: 1.0, clipped: true });
        assert_eq!(apply(cal, -10.0), Applied { value: 0.0, clipped: true });
    }

    #[test]
    fn bounds_themselves_are_not_clipped() {
        assert!(!clip_limit(OUTPUT_MIN).clipped);
        assert!(!clip_limit(OUTPUT_MAX).clipped);
    }

    #[test]
    fn nan_and_infinities_clamp() {
        assert_eq!(clip_limit(f32::NAN).value, OUTPUT_MIN);
        assert_eq!(clip_limit(f32::INFINITY).value, OUTPUT_MAX);
        assert_eq!(clip_limit(f32::NEG_INFINITY).value, OUTPUT_MIN);
    }

    #[test]
    fn table_validity() {
        let ok = [GainOffset::new(1.0, 0.0); 3];
        assert!(is_valid_table(&ok, 3));
        assert!(!is_valid_table(&ok, 4));
        let mut bad = ok;
        bad[1].gain = 0.0;
        assert!(!is_valid_table(&bad, 3));
        bad[1] = GainOffset::new(1.0, f32::NAN);
        assert!(!is_valid_table(&bad, 3));
    }
}
