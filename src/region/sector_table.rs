//! Sector Table
//!
//! The two 4 KiB header tables at the front of every region file.
//!
//! ## Layout
//! ```text
//! sector 0: location[1024]   u32 BE = offset (24 bits) << 8 | sector count (8 bits)
//! sector 1: timestamp[1024]  i32 BE = last write, unix seconds
//! ```
//! Entry `i` describes slot `(x, z)` with `i = x + z * 32`.

use std::io::{Read, Write};
use std::ops::Range;

use crate::error::{Result, TreeError};

use super::{HEADER_SECTORS, REGION_DIM, SECTOR_SIZE, SLOT_COUNT};

/// Largest offset representable in the 24-bit location field
const MAX_OFFSET: u32 = 0x00FF_FFFF;

/// Size of both tables together
pub const TABLES_SIZE: usize = SECTOR_SIZE * HEADER_SECTORS as usize;

/// Decoded placement of one occupied slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotEntry {
    /// First sector of the record body
    pub offset: u32,
    /// Number of sectors reserved for the body
    pub sectors: u8,
    /// Last write time, unix seconds
    pub timestamp: i32,
}

impl SlotEntry {
    /// Sector range `[offset, offset + sectors)`
    pub fn sector_range(&self) -> Range<u32> {
        self.offset..self.offset + self.sectors as u32
    }

    /// Byte offset of the body within the file
    pub fn byte_offset(&self) -> u64 {
        self.offset as u64 * SECTOR_SIZE as u64
    }

    /// Byte length reserved for the body (whole sectors)
    pub fn byte_len(&self) -> u64 {
        self.sectors as u64 * SECTOR_SIZE as u64
    }
}

/// Index of slot `(x, z)` in both tables
pub fn slot_index(x: usize, z: usize) -> usize {
    (x % REGION_DIM) + (z % REGION_DIM) * REGION_DIM
}

/// Sectors needed to hold `byte_len` bytes
pub fn sectors_for(byte_len: usize) -> usize {
    byte_len.div_ceil(SECTOR_SIZE)
}

/// Location and timestamp tables for one region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectorTable {
    locations: Vec<u32>,
    timestamps: Vec<i32>,
}

impl Default for SectorTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SectorTable {
    /// All slots empty, all timestamps zero
    pub fn new() -> Self {
        Self {
            locations: vec![0; SLOT_COUNT],
            timestamps: vec![0; SLOT_COUNT],
        }
    }

    /// Decode both tables from the first 8 KiB of a region file
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < TABLES_SIZE {
            return Err(TreeError::Format(format!(
                "Region header needs {} bytes, got {}",
                TABLES_SIZE,
                bytes.len()
            )));
        }

        let read_u32 = |at: usize| u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

        let locations = (0..SLOT_COUNT).map(|i| read_u32(i * 4)).collect();
        let timestamps = (0..SLOT_COUNT)
            .map(|i| read_u32(SECTOR_SIZE + i * 4) as i32)
            .collect();

        Ok(Self {
            locations,
            timestamps,
        })
    }

    /// Read and decode the tables from the start of a stream
    pub fn read_from(reader: &mut impl Read) -> Result<Self> {
        let mut bytes = vec![0u8; TABLES_SIZE];
        reader.read_exact(&mut bytes).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                TreeError::Format("File is too short to hold region header tables".to_string())
            } else {
                TreeError::Io(e)
            }
        })?;
        Self::decode(&bytes)
    }

    /// Encode both tables, always in full
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(TABLES_SIZE);
        for location in &self.locations {
            bytes.extend_from_slice(&location.to_be_bytes());
        }
        for timestamp in &self.timestamps {
            bytes.extend_from_slice(&timestamp.to_be_bytes());
        }
        bytes
    }

    pub fn write_to(&self, writer: &mut impl Write) -> Result<()> {
        writer.write_all(&self.encode())?;
        Ok(())
    }

    /// Placement of slot `(x, z)`, `None` when empty
    pub fn slot(&self, x: usize, z: usize) -> Option<SlotEntry> {
        let index = slot_index(x, z);
        let location = self.locations[index];
        let offset = location >> 8;
        let sectors = (location & 0xFF) as u8;
        // an offset of 0 with a nonzero size is kept so validate() rejects it
        if sectors == 0 {
            return None;
        }
        Some(SlotEntry {
            offset,
            sectors,
            timestamp: self.timestamps[index],
        })
    }

    /// Point slot `(x, z)` at `sectors` sectors starting at `offset`
    pub fn set_slot(&mut self, x: usize, z: usize, offset: u32, sectors: usize) -> Result<()> {
        if offset > MAX_OFFSET {
            return Err(TreeError::Format(format!(
                "Sector offset {} does not fit in 24 bits",
                offset
            )));
        }
        if sectors == 0 || sectors > u8::MAX as usize {
            return Err(TreeError::Format(format!(
                "Record at ({}, {}) needs {} sectors, must be 1..=255",
                x, z, sectors
            )));
        }
        self.locations[slot_index(x, z)] = (offset << 8) | sectors as u32;
        Ok(())
    }

    /// Mark slot `(x, z)` empty; its timestamp is left alone
    pub fn clear_slot(&mut self, x: usize, z: usize) {
        self.locations[slot_index(x, z)] = 0;
    }

    pub fn timestamp(&self, x: usize, z: usize) -> i32 {
        self.timestamps[slot_index(x, z)]
    }

    pub fn set_timestamp(&mut self, x: usize, z: usize, timestamp: i32) {
        self.timestamps[slot_index(x, z)] = timestamp;
    }

    /// Occupied slots in row-major order (z outer, x inner)
    pub fn occupied(&self) -> impl Iterator<Item = (usize, usize, SlotEntry)> + '_ {
        (0..SLOT_COUNT).filter_map(move |index| {
            let (x, z) = (index % REGION_DIM, index / REGION_DIM);
            self.slot(x, z).map(|entry| (x, z, entry))
        })
    }

    /// Check every occupied slot against the file it came from.
    ///
    /// A single bad entry invalidates the whole table:
    /// - bodies may not start inside the header sectors
    /// - bodies may not extend past `file_len`
    /// - no two bodies may share a sector
    pub fn validate(&self, file_len: u64) -> Result<()> {
        let mut ranges = Vec::new();
        for (x, z, entry) in self.occupied() {
            if entry.offset < HEADER_SECTORS {
                return Err(TreeError::Format(format!(
                    "Invalid region file, thinks there's a record for ({}, {}) at sector {} but the header tables are there",
                    x, z, entry.offset
                )));
            }
            let end = entry.byte_offset() + entry.byte_len();
            if end > file_len {
                return Err(TreeError::Format(format!(
                    "Invalid region file, thinks there's a {}-sector record for ({}, {}) at sector {} but file is only {} bytes long",
                    entry.sectors, x, z, entry.offset, file_len
                )));
            }
            ranges.push((entry.sector_range(), x, z));
        }

        ranges.sort_by_key(|(range, _, _)| range.start);
        for pair in ranges.windows(2) {
            let (first, x1, z1) = &pair[0];
            let (second, x2, z2) = &pair[1];
            if second.start < first.end {
                return Err(TreeError::Format(format!(
                    "Invalid region file, records ({}, {}) and ({}, {}) overlap",
                    x1, z1, x2, z2
                )));
            }
        }
        Ok(())
    }
}
