//! TOML file-backed calibration storage.

use std::path::{Path, PathBuf};

use keycal_config::table::PersistedTable;
use keycal_traits::{BoxError, GainOffset, Storage};

use crate::error::HwError;
use crate::util::write_atomic;

/// Stores the table as TOML at `path`, replacing the file atomically on write.
///
/// A missing file loads as "nothing stored yet".
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    channels: usize,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>, channels: usize) -> Self {
        Self {
            path: path.into(),
            channels,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_table(&self) -> Result<Option<Vec<GainOffset>>, HwError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(HwError::Io(e)),
        };
        let table = PersistedTable::from_toml(&text)
            .map_err(|e| HwError::Corrupt(format!("{}: {e}", self.path.display())))?
            .into_table();
        if table.len() != self.channels {
            return Err(HwError::ChannelCount {
                expected: self.channels,
                got: table.len(),
            });
        }
        Ok(Some(table))
    }

    fn write_table(&self, table: &[GainOffset]) -> Result<(), HwError> {
        if table.len() != self.channels {
            return Err(HwError::ChannelCount {
                expected: self.channels,
                got: table.len(),
            });
        }
        let text = PersistedTable::from_table(table)
            .to_toml()
            .map_err(|e| HwError::Encode(e.to_string()))?;
        write_atomic(&self.path, text.as_bytes())?;
        tracing::debug!(path = %self.path.display(), channels = table.len(), "calibration file written");
        Ok(())
    }
}

impl Storage for FileStorage {
    fn load(&mut self) -> Result<Option<Vec<GainOffset>>, BoxError> {
        Ok(self.read_table()?)
    }

    fn store(&mut self, table: &[GainOffset]) -> Result<(), BoxError> {
        Ok(self.write_table(table)?)
    }
}
