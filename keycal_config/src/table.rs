//! Persisted calibration table schema and its CSV representation.
//!
//! Expected CSV headers:
//! channel,gain,offset
//!
//! Example:
//! channel,gain,offset
//! 0,0.0009375,0.15625
//! 1,1.0,0.0
use keycal_traits::GainOffset;
use serde::{Deserialize, Serialize};

/// Format version written into every persisted table.
pub const TABLE_VERSION: u32 = 1;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct TableRow {
    pub channel: usize,
    pub gain: f32,
    pub offset: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct PersistedEntry {
    pub gain: f32,
    pub offset: f32,
}

/// On-disk form of the active calibration table.
///
/// ```toml
/// version = 1
/// [[channel]]
/// gain = 1.0
/// offset = 0.0
/// ```
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PersistedTable {
    pub version: u32,
    #[serde(rename = "channel", default)]
    pub channels: Vec<PersistedEntry>,
}

impl PersistedTable {
    pub fn from_table(table: &[GainOffset]) -> Self {
        Self {
            version: TABLE_VERSION,
            channels: table
                .iter()
                .map(|c| PersistedEntry {
                    gain: c.gain,
                    offset: c.offset,
                })
                .collect(),
        }
    }

    pub fn into_table(self) -> Vec<GainOffset> {
        self.channels
            .into_iter()
            .map(|e| GainOffset::new(e.gain, e.offset))
            .collect()
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    pub fn from_toml(s: &str) -> eyre::Result<Self> {
        let t: Self = toml::from_str(s).map_err(|e| eyre::eyre!("parse calibration table: {e}"))?;
        if t.version != TABLE_VERSION {
            eyre::bail!(
                "unsupported calibration table version {} (expected {})",
                t.version,
                TABLE_VERSION
            );
        }
        Ok(t)
    }
}

/// Load calibration rows from CSV, rejecting rows that cannot belong to a
/// table of `channels` entries.
pub fn load_table_csv(path: &std::path::Path, channels: usize) -> eyre::Result<Vec<TableRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["channel", "gain", "offset"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "calibration CSV must have headers 'channel,gain,offset', got: {}",
            actual.join(",")
        );
    }

    let mut seen = vec![false; channels];
    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<TableRow>().enumerate() {
        let line = idx + 2;
        let row = rec.map_err(|e| eyre::eyre!("invalid CSV row {line}: {e}"))?;
        if row.channel >= channels {
            eyre::bail!(
                "CSV row {line}: channel {} out of range (0..{channels})",
                row.channel
            );
        }
        if seen[row.channel] {
            eyre::bail!("CSV row {line}: duplicate channel {}", row.channel);
        }
        if !row.gain.is_finite() || !row.offset.is_finite() {
            eyre::bail!("CSV row {line}: gain and offset must be finite");
        }
        if row.gain == 0.0 {
            eyre::bail!("CSV row {line}: gain must be non-zero");
        }
        seen[row.channel] = true;
        rows.push(row);
    }
    Ok(rows)
}

pub fn write_table_csv(path: &std::path::Path, table: &[GainOffset]) -> eyre::Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| eyre::eyre!("create calibration CSV {:?}: {}", path, e))?;
    for (channel, c) in table.iter().enumerate() {
        wtr.serialize(TableRow {
            channel,
            gain: c.gain,
            offset: c.offset,
        })
        .map_err(|e| eyre::eyre!("write calibration CSV row {channel}: {e}"))?;
    }
    wtr.flush()
        .map_err(|e| eyre::eyre!("flush calibration CSV {:?}: {}", path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persisted_table_survives_toml() {
        let table = [GainOffset::new(0.5, -0.25), GainOffset::new(1.0, 0.0)];
        let text = PersistedTable::from_table(&table).to_toml().unwrap();
        let back = PersistedTable::from_toml(&text).unwrap().into_table();
        assert_eq!(back, table);
    }

    #[test]
    fn future_version_is_rejected() {
        let err = PersistedTable::from_toml("version = 9\n").expect_err("version 9");
        assert!(err.to_string().contains("unsupported calibration table version"));
    }
}
