//! Tick period helpers.

use std::time::Duration;

/// Tick period for a configured sample period, clamped to at least 1 µs.
#[inline]
pub fn tick_period(sample_period_us: u64) -> Duration {
    Duration::from_micros(sample_period_us.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_period_clamps_to_one_micro() {
        assert_eq!(tick_period(0), Duration::from_micros(1));
        assert_eq!(tick_period(300), Duration::from_micros(300));
    }
}
