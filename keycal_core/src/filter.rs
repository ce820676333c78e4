//! Boxcar noise filter shared by every channel.
//!
//! Each channel owns a ring of the last `FILTER_SAMPLES` raw readings; the
//! filtered value is their mean. All rings share one write index that moves
//! once per tick, so a tick must call `filter` for every channel before
//! `advance`.

/// Ring length per channel.
pub const FILTER_SAMPLES: usize = 4;

#[derive(Debug, Clone)]
pub struct RingFilter<const N: usize> {
    buf: [[f32; FILTER_SAMPLES]; N],
    primed: [bool; N],
    index: usize,
}

impl<const N: usize> Default for RingFilter<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RingFilter<N> {
    pub fn new() -> Self {
        Self {
            buf: [[0.0; FILTER_SAMPLES]; N],
            primed: [false; N],
            index: 0,
        }
    }

    /// Insert `raw` for `channel` at the shared write position and return the
    /// mean of that channel's ring.
    ///
    /// The first finite sample fills the whole ring. A non-finite sample never
    /// enters the history: a primed channel reports its current mean, an
    /// unprimed one has no value yet and returns `None`.
    #[inline]
    pub fn filter(&mut self, channel: usize, raw: f32) -> Option<f32> {
        if !raw.is_finite() {
            return self.primed[channel].then(|| self.mean(channel));
        }
        let ring = &mut self.buf[channel];
        if self.primed[channel] {
            ring[self.index] = raw;
        } else {
            *ring = [raw; FILTER_SAMPLES];
            self.primed[channel] = true;
        }
        Some(self.mean(channel))
    }

    /// Move the shared write position. Call once per tick.
    #[inline]
    pub fn advance(&mut self) {
        self.index = (self.index + 1) % FILTER_SAMPLES;
    }

    #[inline]
    pub fn mean(&self, channel: usize) -> f32 {
        let sum: f32 = self.buf[channel].iter().sum();
        sum / FILTER_SAMPLES as f32
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn is_primed(&self, channel: usize) -> bool {
        self.primed[channel]
    }
}
