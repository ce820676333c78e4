//! Deterministic simulated key sensors and switches.

use keycal_traits::{BoxError, SensorArray, SwitchBank, SwitchState};

use crate::error::HwError;

/// Each key sweeps a triangle between its own rest and pressed levels, with a
/// per-key period, plus optional bounded noise from a fixed-seed xorshift.
///
/// Key `i` rests near `rest + i * spread` and travels `travel * (1 + i / 200)`,
/// so no two keys share a range.
#[derive(Debug, Clone)]
pub struct SimulatedKeyboard {
    channels: usize,
    tick: u64,
    rest: f32,
    spread: f32,
    travel: f32,
    base_period: u64,
    noise: f32,
    rng: u32,
}

impl SimulatedKeyboard {
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            tick: 0,
            rest: 0.10,
            spread: 0.001,
            travel: 0.70,
            base_period: 400,
            noise: 0.0,
            rng: 0x9E37_79B9,
        }
    }

    /// Add uniform noise in `[-amp, amp]`.
    pub fn with_noise(mut self, amp: f32) -> Self {
        self.noise = amp.abs();
        self
    }

    /// Ticks for the fastest key to go rest → pressed → rest.
    pub fn with_period(mut self, ticks: u64) -> Self {
        self.base_period = ticks.max(2);
        self
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Noise-free level of `channel` at `tick`.
    pub fn level(&self, channel: usize, tick: u64) -> f32 {
        let period = self.base_period + channel as u64 * 7;
        let phase = (tick % period) as f32 / period as f32;
        let tri = if phase < 0.5 {
            phase * 2.0
        } else {
            2.0 - phase * 2.0
        };
        let rest = self.rest + channel as f32 * self.spread;
        let travel = self.travel * (1.0 + channel as f32 / 200.0);
        rest + tri * travel
    }

    fn next_noise(&mut self) -> f32 {
        if self.noise == 0.0 {
            return 0.0;
        }
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        let unit = (x as f32) / (u32::MAX as f32);
        (unit * 2.0 - 1.0) * self.noise
    }
}

impl SensorArray for SimulatedKeyboard {
    fn read(&mut self, out: &mut [f32], _timeout: std::time::Duration) -> Result<(), BoxError> {
        if out.len() != self.channels {
            return Err(Box::new(HwError::ChannelCount {
                expected: self.channels,
                got: out.len(),
            }));
        }
        let tick = self.tick;
        for (ch, v) in out.iter_mut().enumerate() {
            *v = self.level(ch, tick) + self.next_noise();
        }
        self.tick += 1;
        tracing::trace!(tick, "simulated frame");
        Ok(())
    }
}

/// Switch bank pressing each switch once at a chosen read index.
///
/// Read indices count every `read_switches` call from zero. A press holds
/// the switch on for `hold` reads.
#[derive(Debug, Clone, Default)]
pub struct SimulatedSwitches {
    reads: u64,
    freeze_at: Option<u64>,
    reset_at: Option<u64>,
    hold: u64,
}

impl SimulatedSwitches {
    pub fn new() -> Self {
        Self {
            hold: 1,
            ..Self::default()
        }
    }

    pub fn freeze_at(mut self, read: u64) -> Self {
        self.freeze_at = Some(read);
        self
    }

    pub fn reset_at(mut self, read: u64) -> Self {
        self.reset_at = Some(read);
        self
    }

    pub fn hold_for(mut self, reads: u64) -> Self {
        self.hold = reads.max(1);
        self
    }

    fn pressed(&self, at: Option<u64>) -> bool {
        at.is_some_and(|t| (t..t.saturating_add(self.hold)).contains(&self.reads))
    }
}

impl SwitchBank for SimulatedSwitches {
    fn read_switches(&mut self) -> Result<SwitchState, BoxError> {
        let s = SwitchState {
            freeze: self.pressed(self.freeze_at),
            reset: self.pressed(self.reset_at),
        };
        self.reads += 1;
        Ok(s)
    }
}
