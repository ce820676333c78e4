//! Rising-edge detection for polled switches.

/// Remembers the previous level of one switch.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeLatch {
    last: bool,
}

impl EdgeLatch {
    pub const fn new(initial: bool) -> Self {
        Self { last: initial }
    }

    /// Record the current level; true only on a false → true transition.
    #[inline]
    pub fn rising(&mut self, level: bool) -> bool {
        let edge = level && !self.last;
        self.last = level;
        edge
    }

    #[inline]
    pub fn level(&self) -> bool {
        self.last
    }
}
