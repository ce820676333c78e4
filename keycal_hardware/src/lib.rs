//! Collaborator implementations for the calibration engine.
//!
//! - `sim`: deterministic simulated key sensors and switches
//! - `file_store`: TOML file storage with atomic replace
//! - `eeprom`: emulated EEPROM byte image with checksum and write counter
//! - `gpio` (feature `hardware`): physical freeze/reset switches

pub mod eeprom;
pub mod error;
pub mod file_store;
#[cfg(feature = "hardware")]
pub mod gpio;
pub mod sim;
pub mod util;

pub use eeprom::EmulatedEeprom;
pub use file_store::FileStorage;
#[cfg(feature = "hardware")]
pub use gpio::GpioSwitches;
pub use sim::{SimulatedKeyboard, SimulatedSwitches};
