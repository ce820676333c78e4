use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("sensor error: {0}")]
    Sensor(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("timeout waiting for sensor frame")]
    Timeout,
    #[error("channel count mismatch: expected {expected}, got {got}")]
    ChannelCount { expected: usize, got: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
