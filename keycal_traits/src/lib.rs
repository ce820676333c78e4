pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// Error type used at every collaborator boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Linear calibration for one channel: `out = gain * x + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainOffset {
    pub gain: f32,
    pub offset: f32,
}

impl GainOffset {
    pub const fn new(gain: f32, offset: f32) -> Self {
        Self { gain, offset }
    }
}

/// Snapshot of the two calibration switches for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwitchState {
    /// Commit staged calibration and persist it.
    pub freeze: bool,
    /// Discard all calibration and persist defaults.
    pub reset: bool,
}

/// Array of analog position sensors, one reading per channel.
pub trait SensorArray {
    /// Fill `out` with one raw reading per channel.
    fn read(&mut self, out: &mut [f32], timeout: std::time::Duration) -> Result<(), BoxError>;
}

pub trait SwitchBank {
    fn read_switches(&mut self) -> Result<SwitchState, BoxError>;
}

/// Non-volatile home of the active calibration table.
pub trait Storage {
    /// Return the stored table, or `None` when nothing has been stored yet.
    fn load(&mut self) -> Result<Option<Vec<GainOffset>>, BoxError>;
    fn store(&mut self, table: &[GainOffset]) -> Result<(), BoxError>;
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn load(&mut self) -> Result<Option<Vec<GainOffset>>, BoxError> {
        (**self).load()
    }
    fn store(&mut self, table: &[GainOffset]) -> Result<(), BoxError> {
        (**self).store(table)
    }
}

impl<A: SensorArray + ?Sized> SensorArray for Box<A> {
    fn read(&mut self, out: &mut [f32], timeout: std::time::Duration) -> Result<(), BoxError> {
        (**self).read(out, timeout)
    }
}

impl<B: SwitchBank + ?Sized> SwitchBank for Box<B> {
    fn read_switches(&mut self) -> Result<SwitchState, BoxError> {
        (**self).read_switches()
    }
}
