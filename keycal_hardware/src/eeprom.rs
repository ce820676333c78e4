//! Byte-image EEPROM emulation.
//!
//! Layout (little-endian):
//!
//! | offset | size   | field                         |
//! |--------|--------|-------------------------------|
//! | 0      | 4      | magic `KCAL`                  |
//! | 4      | 1      | layout version                |
//! | 5      | 1      | reserved (0)                  |
//! | 6      | 2      | channel count `n`             |
//! | 8      | 4      | write counter                 |
//! | 12     | 8·n    | `gain: f32, offset: f32` each |
//! | 12+8n  | 2      | Fletcher-16 of bytes `0..12+8n` |
//!
//! An erased device reads as all `0xFF`, which decodes as "nothing stored".

use std::path::PathBuf;

use keycal_traits::{BoxError, GainOffset, Storage};

use crate::error::{HwError, Result};
use crate::util::{fletcher16, write_atomic};

pub const MAGIC: [u8; 4] = *b"KCAL";
pub const LAYOUT_VERSION: u8 = 1;
pub const HEADER_LEN: usize = 12;
pub const ENTRY_LEN: usize = 8;
/// 32 Kbit part.
pub const DEFAULT_CAPACITY: usize = 4096;
const ERASED: u8 = 0xFF;

/// Bytes needed for a table of `channels` entries.
pub const fn image_len(channels: usize) -> usize {
    HEADER_LEN + channels * ENTRY_LEN + 2
}

/// Decoded contents of an image.
#[derive(Debug, Clone, PartialEq)]
pub struct EepromRecord {
    pub table: Vec<GainOffset>,
    pub write_count: u32,
}

pub fn encode_image(table: &[GainOffset], write_count: u32) -> Result<Vec<u8>> {
    let n = u16::try_from(table.len()).map_err(|_| HwError::Encode(format!("{} channels", table.len())))?;
    let mut buf = Vec::with_capacity(image_len(table.len()));
    buf.extend_from_slice(&MAGIC);
    buf.push(LAYOUT_VERSION);
    buf.push(0);
    buf.extend_from_slice(&n.to_le_bytes());
    buf.extend_from_slice(&write_count.to_le_bytes());
    for c in table {
        buf.extend_from_slice(&c.gain.to_le_bytes());
        buf.extend_from_slice(&c.offset.to_le_bytes());
    }
    let sum = fletcher16(&buf);
    buf.extend_from_slice(&sum.to_le_bytes());
    Ok(buf)
}

fn le_u16(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

fn le_u32(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

fn le_f32(b: &[u8], at: usize) -> f32 {
    f32::from_bits(le_u32(b, at))
}

/// Decode an image. `Ok(None)` for an erased header.
pub fn decode_image(bytes: &[u8]) -> Result<Option<EepromRecord>> {
    if bytes.len() < HEADER_LEN {
        return Err(HwError::Corrupt(format!("image is {} bytes", bytes.len())));
    }
    if bytes[..HEADER_LEN].iter().all(|&b| b == ERASED) {
        return Ok(None);
    }
    if bytes[..4] != MAGIC {
        return Err(HwError::Corrupt("bad magic".into()));
    }
    if bytes[4] != LAYOUT_VERSION {
        return Err(HwError::Corrupt(format!("unsupported layout version {}", bytes[4])));
    }
    let n = usize::from(le_u16(bytes, 6));
    let end = HEADER_LEN + n * ENTRY_LEN;
    if bytes.len() < end + 2 {
        return Err(HwError::Corrupt(format!(
            "truncated: {n} channels need {} bytes, image has {}",
            end + 2,
            bytes.len()
        )));
    }
    let stored = le_u16(bytes, end);
    let actual = fletcher16(&bytes[..end]);
    if stored != actual {
        return Err(HwError::Corrupt(format!(
            "checksum mismatch: stored {stored:#06x}, computed {actual:#06x}"
        )));
    }
    let table = (0..n)
        .map(|i| {
            let at = HEADER_LEN + i * ENTRY_LEN;
            GainOffset::new(le_f32(bytes, at), le_f32(bytes, at + 4))
        })
        .collect();
    Ok(Some(EepromRecord {
        table,
        write_count: le_u32(bytes, 8),
    }))
}

/// In-memory EEPROM, optionally mirrored to an image file after each write.
#[derive(Debug, Clone)]
pub struct EmulatedEeprom {
    image: Vec<u8>,
    channels: usize,
    write_count: u32,
    backing: Option<PathBuf>,
}

impl EmulatedEeprom {
    /// Blank (erased) device of `capacity` bytes.
    pub fn new(capacity: usize, channels: usize) -> Self {
        Self {
            image: vec![ERASED; capacity],
            channels,
            write_count: 0,
            backing: None,
        }
    }

    /// Device backed by an image file; a missing file starts erased.
    pub fn open(path: impl Into<PathBuf>, capacity: usize, channels: usize) -> Result<Self> {
        let path = path.into();
        let mut dev = Self::new(capacity, channels);
        match std::fs::read(&path) {
            Ok(bytes) => {
                if bytes.len() > capacity {
                    return Err(HwError::Capacity {
                        need: bytes.len(),
                        have: capacity,
                    });
                }
                dev.image[..bytes.len()].copy_from_slice(&bytes);
                if let Ok(Some(rec)) = decode_image(&dev.image) {
                    dev.write_count = rec.write_count;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(HwError::Io(e)),
        }
        dev.backing = Some(path);
        Ok(dev)
    }

    /// Total successful writes over the device's life.
    pub fn write_count(&self) -> u32 {
        self.write_count
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// Return the device to the erased state.
    pub fn erase(&mut self) -> Result<()> {
        self.image.fill(ERASED);
        self.flush()
    }

    fn flush(&self) -> Result<()> {
        if let Some(p) = &self.backing {
            write_atomic(p, &self.image)?;
        }
        Ok(())
    }

    fn read_table(&self) -> Result<Option<Vec<GainOffset>>> {
        let Some(rec) = decode_image(&self.image)? else {
            return Ok(None);
        };
        if rec.table.len() != self.channels {
            return Err(HwError::ChannelCount {
                expected: self.channels,
                got: rec.table.len(),
            });
        }
        Ok(Some(rec.table))
    }

    fn write_table(&mut self, table: &[GainOffset]) -> Result<()> {
        if table.len() != self.channels {
            return Err(HwError::ChannelCount {
                expected: self.channels,
                got: table.len(),
            });
        }
        let next = self.write_count.wrapping_add(1);
        let bytes = encode_image(table, next)?;
        if bytes.len() > self.image.len() {
            return Err(HwError::Capacity {
                need: bytes.len(),
                have: self.image.len(),
            });
        }
        self.image[..bytes.len()].copy_from_slice(&bytes);
        self.flush()?;
        self.write_count = next;
        tracing::debug!(write_count = next, bytes = bytes.len(), "eeprom written");
        Ok(())
    }
}

impl Storage for EmulatedEeprom {
    fn load(&mut self) -> std::result::Result<Option<Vec<GainOffset>>, BoxError> {
        Ok(self.read_table()?)
    }

    fn store(&mut self, table: &[GainOffset]) -> std::result::Result<(), BoxError> {
        Ok(self.write_table(table)?)
    }
}
