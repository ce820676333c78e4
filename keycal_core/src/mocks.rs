//! Test and helper mocks for keycal_core

use keycal_traits::{BoxError, GainOffset, SensorArray, Storage, SwitchBank, SwitchState};

/// In-memory `Storage` with failure injection and a write counter.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    pub stored: Option<Vec<GainOffset>>,
    /// Successful `store` calls.
    pub writes: usize,
    pub fail_writes: bool,
    pub fail_loads: bool,
}

impl MemoryStorage {
    pub fn with_table(table: Vec<GainOffset>) -> Self {
        Self {
            stored: Some(table),
            ..Self::default()
        }
    }
}

impl Storage for MemoryStorage {
    fn load(&mut self) -> Result<Option<Vec<GainOffset>>, BoxError> {
        if self.fail_loads {
            return Err("memory storage: injected load failure".into());
        }
        Ok(self.stored.clone())
    }

    fn store(&mut self, table: &[GainOffset]) -> Result<(), BoxError> {
        if self.fail_writes {
            return Err("memory storage: injected write failure".into());
        }
        self.stored = Some(table.to_vec());
        self.writes += 1;
        Ok(())
    }
}

/// Replays a fixed list of frames, then repeats the last one.
#[derive(Debug, Clone)]
pub struct ScriptedSensors {
    frames: Vec<Vec<f32>>,
    pos: usize,
}

impl ScriptedSensors {
    pub fn new(frames: Vec<Vec<f32>>) -> Self {
        Self { frames, pos: 0 }
    }
}

impl SensorArray for ScriptedSensors {
    fn read(&mut self, out: &mut [f32], _timeout: std::time::Duration) -> Result<(), BoxError> {
        let Some(frame) = self
            .frames
            .get(self.pos)
            .or_else(|| self.frames.last())
        else {
            return Err("scripted sensors: no frames".into());
        };
        if frame.len() != out.len() {
            return Err(format!(
                "scripted sensors: frame has {} channels, expected {}",
                frame.len(),
                out.len()
            )
            .into());
        }
        out.copy_from_slice(frame);
        self.pos += 1;
        Ok(())
    }
}

/// Switch levels indexed by read count; off once the script runs out.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSwitches {
    levels: Vec<SwitchState>,
    pos: usize,
}

impl ScriptedSwitches {
    pub fn new(levels: Vec<SwitchState>) -> Self {
        Self { levels, pos: 0 }
    }
}

impl SwitchBank for ScriptedSwitches {
    fn read_switches(&mut self) -> Result<SwitchState, BoxError> {
        let s = self.levels.get(self.pos).copied().unwrap_or_default();
        self.pos += 1;
        Ok(s)
    }
}
