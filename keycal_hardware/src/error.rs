use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored calibration is corrupt: {0}")]
    Corrupt(String),
    #[error("eeprom too small: need {need} bytes, have {have}")]
    Capacity { need: usize, have: usize },
    #[error("channel count mismatch: expected {expected}, got {got}")]
    ChannelCount { expected: usize, got: usize },
    #[error("encode: {0}")]
    Encode(String),
}

pub type Result<T> = std::result::Result<T, HwError>;
