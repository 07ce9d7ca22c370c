//! Record Store
//!
//! Owns one region file: its header tables, the grid of record slots, and
//! the packing of record bodies into sectors.
//!
//! ## Responsibilities
//! - Validate the header tables on open (a bad table rejects the whole file)
//! - Hand out lazy records; read their bodies on demand
//! - Move records in and out of slots without aliasing bytes between regions
//! - Repack every record contiguously on save
//!
//! ## Resource Model
//! The file is opened for the duration of each read or save call and closed
//! again; nothing holds a handle between calls.

use std::cell::{Cell, RefCell};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, TreeError};
use crate::nbt::{BincodeCodec, RecordCodec};

use super::record::{check_coords, trim_body, LazyRecord, RecordHandle, BODY_HEADER_SIZE, EXTERNAL_FLAG};
use super::sector_table::{sectors_for, slot_index, SectorTable, SlotEntry};
use super::{HEADER_SECTORS, REGION_DIM, SECTOR_SIZE, SLOT_COUNT};

/// Shared handle to a record store
pub type StoreHandle = Rc<RecordStore>;

/// A region file and its records
pub struct RecordStore {
    /// Backing file; `None` for regions created in memory
    path: RefCell<Option<PathBuf>>,

    /// Header tables describing the file as it is on disk right now
    table: RefCell<SectorTable>,

    /// Record handles indexed by `slot_index(x, z)`
    slots: RefCell<Vec<Option<RecordHandle>>>,

    /// Payload codec handed to every scanned record
    codec: Rc<dyn RecordCodec>,

    config: Config,

    /// Set by add/remove, cleared by save
    has_slot_changes: Cell<bool>,

    /// Given to records so they can find their way back here
    weak_self: Weak<RecordStore>,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("path", &self.path.borrow())
            .field("records", &self.record_count())
            .finish()
    }
}

impl RecordStore {
    /// An empty region with no backing file
    pub fn create_empty() -> StoreHandle {
        Self::create_empty_with(Config::default(), Rc::new(BincodeCodec))
    }

    /// An empty region using the given config and codec
    pub fn create_empty_with(config: Config, codec: Rc<dyn RecordCodec>) -> StoreHandle {
        Self::build(None, SectorTable::new(), config, codec)
    }

    /// Open a region file with the default config and codec
    pub fn open(path: &Path) -> Result<StoreHandle> {
        Self::open_with(path, Config::default(), Rc::new(BincodeCodec))
    }

    /// Open a region file
    ///
    /// On open:
    /// 1. Read both header tables
    /// 2. Validate every occupied slot against the file length
    /// 3. Create a lazy record per occupied slot (external ones read their marker)
    /// 4. Decode the first record to confirm this really is a region file
    pub fn open_with(path: &Path, config: Config, codec: Rc<dyn RecordCodec>) -> Result<StoreHandle> {
        // Step 1: Read header tables
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let table = SectorTable::read_from(&mut file)?;

        // Step 2: Reject the whole file on any bad entry
        table.validate(file_len)?;

        // Step 3: Scan slots
        let store = Self::build(Some(path.to_path_buf()), table.clone(), config, codec);
        let mut checked_first = false;

        for (x, z, entry) in table.occupied() {
            let mut header = [0u8; BODY_HEADER_SIZE];
            file.seek(SeekFrom::Start(entry.byte_offset()))?;
            file.read_exact(&mut header)?;
            let compression_byte = header[4];

            let external_raw = if compression_byte & EXTERNAL_FLAG != 0 {
                Some(read_span(&mut file, &entry)?)
            } else {
                None
            };

            let record = LazyRecord::scanned(
                x,
                z,
                Rc::downgrade(&store),
                Rc::clone(&store.codec),
                compression_byte,
                external_raw,
            );
            store.slots.borrow_mut()[slot_index(x, z)] = Some(Rc::clone(&record));

            // Step 4: Sanity-check the first populated slot only
            if !checked_first {
                checked_first = true;
                if store.config.verify_first_record && !record.is_external() {
                    record.verify().map_err(|e| {
                        TreeError::Format(format!(
                            "First record ({}, {}) failed to decode, not a region file? {}",
                            x, z, e
                        ))
                    })?;
                }
            }
        }

        info!(
            path = %path.display(),
            records = store.record_count(),
            "opened region"
        );
        Ok(store)
    }

    fn build(
        path: Option<PathBuf>,
        table: SectorTable,
        config: Config,
        codec: Rc<dyn RecordCodec>,
    ) -> StoreHandle {
        Rc::new_cyclic(|weak| Self {
            path: RefCell::new(path),
            table: RefCell::new(table),
            slots: RefCell::new(vec![None; SLOT_COUNT]),
            codec,
            config,
            has_slot_changes: Cell::new(false),
            weak_self: weak.clone(),
        })
    }

    // =========================================================================
    // Record Access
    // =========================================================================

    /// Record at `(x, z)`, `None` if the slot is empty or out of range
    pub fn record(&self, x: usize, z: usize) -> Option<RecordHandle> {
        if x >= REGION_DIM || z >= REGION_DIM {
            return None;
        }
        self.slots.borrow()[slot_index(x, z)].clone()
    }

    /// All records in row-major order
    pub fn records(&self) -> Vec<RecordHandle> {
        self.slots.borrow().iter().flatten().cloned().collect()
    }

    pub fn record_count(&self) -> usize {
        self.slots.borrow().iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }

    /// Free coordinates, scanning x-major from `(start_x, start_z)`
    pub fn available_coords(&self, start_x: usize, start_z: usize) -> Vec<(usize, usize)> {
        let slots = self.slots.borrow();
        let mut free = Vec::new();
        for x in start_x..REGION_DIM {
            let first_z = if x == start_x { start_z } else { 0 };
            for z in first_z..REGION_DIM {
                if slots[slot_index(x, z)].is_none() {
                    free.push((x, z));
                }
            }
        }
        free
    }

    /// Place `record` into its slot.
    ///
    /// A record still owned by another region is loaded and removed from it
    /// first, so no two regions ever share its bytes.
    pub fn add_record(&self, record: RecordHandle) -> Result<()> {
        let (x, z) = record.coords();
        check_coords(x, z)?;
        let index = slot_index(x, z);

        if self.slots.borrow()[index].is_some() {
            return Err(TreeError::InvalidState(format!(
                "There is already a record at coordinates {}, {}",
                x, z
            )));
        }

        if let Some(previous) = record.owner() {
            if !std::ptr::eq(Rc::as_ptr(&previous), self) {
                record.load();
                previous.remove_record(x, z)?;
            }
        }

        self.slots.borrow_mut()[index] = Some(Rc::clone(&record));
        self.table.borrow_mut().clear_slot(x, z);
        record.set_owner(self.weak_self.clone());
        self.has_slot_changes.set(true);
        debug!(x, z, "record added");
        Ok(())
    }

    /// Take the record out of `(x, z)`.
    ///
    /// The record keeps its document (or its raw body, if never loaded) so it
    /// can be added back or elsewhere.
    pub fn remove_record(&self, x: usize, z: usize) -> Result<Option<RecordHandle>> {
        check_coords(x, z)?;
        let index = slot_index(x, z);
        let record = match self.slots.borrow()[index].clone() {
            Some(record) => record,
            None => return Ok(None),
        };

        record.capture_raw()?;

        self.slots.borrow_mut()[index] = None;
        self.table.borrow_mut().clear_slot(x, z);
        record.clear_owner();
        self.has_slot_changes.set(true);
        debug!(x, z, "record removed");
        Ok(Some(record))
    }

    /// Read the body stored for `(x, z)` in the current file
    pub(crate) fn read_slot(&self, x: usize, z: usize) -> Result<Bytes> {
        let path = self.path().ok_or_else(|| {
            TreeError::InvalidState("region has no backing file".to_string())
        })?;
        let entry = self.table.borrow().slot(x, z).ok_or_else(|| {
            TreeError::InvalidState(format!("slot ({}, {}) has no body on disk", x, z))
        })?;
        let mut file = File::open(&path)?;
        read_span(&mut file, &entry)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Rewrite the backing file
    pub fn save(&self) -> Result<()> {
        let path = self.path().ok_or_else(|| {
            TreeError::InvalidState("region has no backing file, use save_as".to_string())
        })?;
        self.write_to(&path)
    }

    /// Write to `path` and make it the backing file
    pub fn save_as(&self, path: &Path) -> Result<()> {
        self.write_to(path)?;
        *self.path.borrow_mut() = Some(path.to_path_buf());
        Ok(())
    }

    /// Full repack
    ///
    /// Steps:
    /// 1. Collect every record's bytes (never-loaded bodies come from the old file)
    /// 2. Assign contiguous sectors from sector 2 in row-major order
    /// 3. Write tables, then bodies padded to whole sectors
    /// 4. Adopt the new table
    fn write_to(&self, target: &Path) -> Result<()> {
        let now = unix_now();
        let slots = self.slots.borrow().clone();
        let mut table = self.table.borrow().clone();
        let mut bodies: Vec<Bytes> = Vec::new();
        let mut next_sector = HEADER_SECTORS;

        // Steps 1 & 2: Collect bodies and compute placement
        for (index, slot) in slots.iter().enumerate() {
            let (x, z) = (index % REGION_DIM, index / REGION_DIM);
            table.clear_slot(x, z);

            let record = match slot {
                Some(record) => record,
                None => continue,
            };
            let touched = record.was_touched();
            let body = match record.save_bytes()? {
                Some(body) => body,
                None => {
                    debug!(x, z, "skipping corrupt record");
                    continue;
                }
            };

            let sectors = sectors_for(body.len());
            table.set_slot(x, z, next_sector, sectors)?;
            if touched {
                table.set_timestamp(x, z, now);
            }
            next_sector += sectors as u32;
            bodies.push(body);
        }

        // Step 3: Tables first, then bodies
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(target)?;
        let mut writer = BufWriter::new(file);
        table.write_to(&mut writer)?;
        for body in &bodies {
            writer.write_all(body)?;
            let padding = sectors_for(body.len()) * SECTOR_SIZE - body.len();
            writer.write_all(&vec![0u8; padding])?;
        }
        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| TreeError::Io(e.into_error()))?;
        file.sync_all()?;

        // Step 4: The file now matches the new table
        *self.table.borrow_mut() = table;
        self.has_slot_changes.set(false);
        for record in slots.iter().flatten() {
            if let Some(doc) = record.document() {
                doc.mark_clean();
            }
        }

        info!(
            path = %target.display(),
            records = bodies.len(),
            sectors = next_sector,
            "saved region"
        );
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn path(&self) -> Option<PathBuf> {
        self.path.borrow().clone()
    }

    /// File name for display, or a placeholder for in-memory regions
    pub fn display_name(&self) -> String {
        self.path
            .borrow()
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "(unsaved region)".to_string())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Copy of the header tables as last read or written
    pub fn sector_table(&self) -> SectorTable {
        self.table.borrow().clone()
    }

    /// Slot changes since the last save, or any loaded document is dirty
    pub fn has_unsaved_changes(&self) -> bool {
        self.has_slot_changes.get()
            || self
                .slots
                .borrow()
                .iter()
                .flatten()
                .any(|r| r.document().map_or(false, |d| d.is_dirty()))
    }

    pub fn can_save(&self) -> bool {
        self.path.borrow().is_some()
    }

    /// Rename the backing file on disk
    pub fn move_to(&self, path: &Path) -> Result<()> {
        if let Some(current) = self.path() {
            fs::rename(&current, path)?;
            *self.path.borrow_mut() = Some(path.to_path_buf());
        }
        Ok(())
    }
}

/// Read a slot's sectors and trim to the body its header declares
fn read_span(file: &mut File, entry: &SlotEntry) -> Result<Bytes> {
    let mut span = vec![0u8; entry.byte_len() as usize];
    file.seek(SeekFrom::Start(entry.byte_offset()))?;
    file.read_exact(&mut span)?;
    Ok(trim_body(span))
}

/// Current time for the timestamp table, clamped to what an `i32` holds.
/// A clock set before the epoch stamps 0.
fn unix_now() -> i32 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    clamp_timestamp(secs)
}

fn clamp_timestamp(secs: u64) -> i32 {
    i32::try_from(secs).unwrap_or(i32::MAX)
}
