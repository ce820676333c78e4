//! Rate limiter for non-volatile writes.
//!
//! Non-forced writes closer than `min_interval_ms` to the previous successful
//! write are skipped outright: they are neither queued nor deferred.

use crate::error::CalError;

/// What happened to one write request.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    Written,
    /// Rate limited; `remaining_ms` until a non-forced write would be allowed.
    Skipped { remaining_ms: u64 },
    Failed(CalError),
}

impl WriteOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            WriteOutcome::Written => "written",
            WriteOutcome::Skipped { .. } => "skipped",
            WriteOutcome::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WriteGate {
    min_interval_ms: u64,
    /// Time of the last successful write; `None` means never.
    last_write_ms: Option<u64>,
}

impl WriteGate {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            min_interval_ms,
            last_write_ms: None,
        }
    }

    /// Milliseconds until a non-forced write is allowed (0 = now).
    #[inline]
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        match self.last_write_ms {
            None => 0,
            Some(t) => self
                .min_interval_ms
                .saturating_sub(now_ms.saturating_sub(t)),
        }
    }

    #[inline]
    pub fn permits(&self, now_ms: u64, force: bool) -> bool {
        force || self.remaining_ms(now_ms) == 0
    }

    #[inline]
    pub fn mark_written(&mut self, now_ms: u64) {
        self.last_write_ms = Some(now_ms);
    }
}
