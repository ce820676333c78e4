//! Running extrema of the filtered signal since the last commit or reset.

#[derive(Debug, Clone)]
pub struct RangeTracker<const N: usize> {
    min: [f32; N],
    max: [f32; N],
    min_seen: [bool; N],
    max_seen: [bool; N],
}

impl<const N: usize> Default for RangeTracker<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RangeTracker<N> {
    pub fn new() -> Self {
        Self {
            min: [0.0; N],
            max: [0.0; N],
            min_seen: [false; N],
            max_seen: [false; N],
        }
    }

    /// Widen the channel's range to include `value`.
    ///
    /// Returns true when either extremum moved. Non-finite values are ignored.
    #[inline]
    pub fn update(&mut self, channel: usize, value: f32) -> bool {
        if !value.is_finite() {
            return false;
        }
        let mut widened = false;
        if !self.min_seen[channel] || value < self.min[channel] {
            self.min[channel] = value;
            self.min_seen[channel] = true;
            widened = true;
        }
        if !self.max_seen[channel] || value > self.max[channel] {
            self.max[channel] = value;
            self.max_seen[channel] = true;
            widened = true;
        }
        widened
    }

    /// `(min, max)` once both extremes have been seen.
    #[inline]
    pub fn range(&self, channel: usize) -> Option<(f32, f32)> {
        (self.min_seen[channel] && self.max_seen[channel])
            .then(|| (self.min[channel], self.max[channel]))
    }

    #[inline]
    pub fn span(&self, channel: usize) -> Option<f32> {
        self.range(channel).map(|(lo, hi)| hi - lo)
    }

    pub fn clear(&mut self, channel: usize) {
        self.min[channel] = 0.0;
        self.max[channel] = 0.0;
        self.min_seen[channel] = false;
        self.max_seen[channel] = false;
    }

    pub fn clear_all(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_channel_has_no_range() {
        let r = RangeTracker::<2>::new();
        assert_eq!(r.range(0), None);
        assert_eq!(r.span(1), None);
    }

    #[test]
    fn single_value_sets_both_extremes() {
        let mut r = RangeTracker::<1>::new();
        assert!(r.update(0, 3.0));
        assert_eq!(r.range(0), Some((3.0, 3.0)));
        assert_eq!(r.span(0), Some(0.0));
    }

    #[test]
    fn only_widens() {
        let mut r = RangeTracker::<1>::new();
        r.update(0, 5.0);
        r.update(0, 1.0);
        r.update(0, 9.0);
        assert!(!r.update(0, 4.0));
        assert_eq!(r.range(0), Some((1.0, 9.0)));
    }

    #[test]
    fn repeated_equal_input_is_idempotent() {
        let mut r = RangeTracker::<1>::new();
        assert!(r.update(0, 2.0));
        for _ in 0..10 {
            assert!(!r.update(0, 2.0));
        }
        assert_eq!(r.range(0), Some((2.0, 2.0)));
    }

    #[test]
    fn clear_forgets_one_channel() {
        let mut r = RangeTracker::<2>::new();
        r.update(0, 1.0);
        r.update(1, 1.0);
        r.clear(0);
        assert_eq!(r.range(0), None);
        assert!(r.range(1).is_some());
        r.clear_all();
        assert_eq!(r.range(1), None);
    }

    #[test]
    fn nan_is_ignored() {
        let mut r = RangeTracker::<1>::new();
        assert!(!r.update(0, f32::NAN));
        assert_eq!(r.range(0), None);
    }
}
