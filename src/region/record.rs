//! Lazy Record
//!
//! Handle to one record (chunk) of a region. Records start undecoded and
//! decode their payload into a [`Document`] on first access.
//!
//! ## States
//! ```text
//!   NotLoaded ──load ok──▶ Loaded
//!       │
//!       └────load err───▶ Corrupt
//!
//!   External  (payload in a sibling file, never read from the region)
//! ```
//!
//! ## Body Format
//! ```text
//! ┌──────────────┬────────────────┬──────────────────────────┐
//! │ Len: u32 BE  │ Compression u8 │ Payload (Len - 1 bytes)  │
//! └──────────────┴────────────────┴──────────────────────────┘
//! ```
//! Compression bit `0x80` marks an external record.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::{Result, TreeError};
use crate::nbt::{BincodeCodec, Compression, Document, DocumentHandle, RecordCodec};

use super::store::RecordStore;
use super::REGION_DIM;

/// Length prefix + compression byte
pub const BODY_HEADER_SIZE: usize = 5;

/// Compression-byte flag for records stored outside the region
pub const EXTERNAL_FLAG: u8 = 0x80;

/// Shared handle to a record
pub type RecordHandle = Rc<LazyRecord>;

/// Observable load state of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    NotLoaded,
    Loaded,
    Corrupt,
    External,
}

#[derive(Debug)]
enum RecordState {
    /// `raw` is filled once the body has been pulled into memory
    NotLoaded { raw: Option<Bytes> },
    Loaded(DocumentHandle),
    Corrupt { raw_len: usize },
    External { raw: Bytes },
}

/// Parse the body header: `(payload length incl. compression byte, compression byte)`
pub fn parse_body_header(body: &[u8]) -> Option<(usize, u8)> {
    if body.len() < BODY_HEADER_SIZE {
        return None;
    }
    let len = u32::from_be_bytes([body[0], body[1], body[2], body[3]]) as usize;
    Some((len, body[4]))
}

/// Trim a sector span down to the exact body, when its header is sane
pub(crate) fn trim_body(span: Vec<u8>) -> Bytes {
    let mut span = span;
    if let Some((len, _)) = parse_body_header(&span) {
        if len >= 1 && 4 + len <= span.len() {
            span.truncate(4 + len);
        }
    }
    Bytes::from(span)
}

/// One record slot's content
pub struct LazyRecord {
    x: usize,
    z: usize,
    state: RefCell<RecordState>,
    owner: RefCell<Weak<RecordStore>>,
    codec: Rc<dyn RecordCodec>,
    compression: Cell<Option<Compression>>,
}

impl std::fmt::Debug for LazyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyRecord")
            .field("x", &self.x)
            .field("z", &self.z)
            .field("status", &self.status())
            .finish()
    }
}

impl LazyRecord {
    /// A detached record that already holds `document`
    pub fn new(x: usize, z: usize, document: DocumentHandle) -> Result<RecordHandle> {
        check_coords(x, z)?;
        document.mark_dirty();
        Ok(Rc::new(Self {
            x,
            z,
            state: RefCell::new(RecordState::Loaded(document)),
            owner: RefCell::new(Weak::new()),
            codec: Rc::new(BincodeCodec),
            compression: Cell::new(None),
        }))
    }

    /// A record scanned from a region whose body is still on disk
    pub(crate) fn scanned(
        x: usize,
        z: usize,
        owner: Weak<RecordStore>,
        codec: Rc<dyn RecordCodec>,
        compression_byte: u8,
        external_raw: Option<Bytes>,
    ) -> RecordHandle {
        let state = match external_raw {
            Some(raw) => RecordState::External { raw },
            None => RecordState::NotLoaded { raw: None },
        };
        Rc::new(Self {
            x,
            z,
            state: RefCell::new(state),
            owner: RefCell::new(owner),
            codec,
            compression: Cell::new(Compression::from_id(compression_byte & !EXTERNAL_FLAG)),
        })
    }

    pub fn x(&self) -> usize {
        self.x
    }

    pub fn z(&self) -> usize {
        self.z
    }

    pub fn coords(&self) -> (usize, usize) {
        (self.x, self.z)
    }

    pub fn status(&self) -> RecordStatus {
        match &*self.state.borrow() {
            RecordState::NotLoaded { .. } => RecordStatus::NotLoaded,
            RecordState::Loaded(_) => RecordStatus::Loaded,
            RecordState::Corrupt { .. } => RecordStatus::Corrupt,
            RecordState::External { .. } => RecordStatus::External,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.status() == RecordStatus::Loaded
    }

    pub fn is_corrupt(&self) -> bool {
        self.status() == RecordStatus::Corrupt
    }

    pub fn is_external(&self) -> bool {
        self.status() == RecordStatus::External
    }

    /// Decoded during this session; save bumps the timestamp of these only
    pub fn was_touched(&self) -> bool {
        self.is_loaded()
    }

    /// The decoded document, if loaded
    pub fn document(&self) -> Option<DocumentHandle> {
        match &*self.state.borrow() {
            RecordState::Loaded(doc) => Some(Rc::clone(doc)),
            _ => None,
        }
    }

    /// Byte length of the last known raw body (corrupt records keep it)
    pub fn raw_len(&self) -> Option<usize> {
        match &*self.state.borrow() {
            RecordState::NotLoaded { raw } => raw.as_ref().map(|r| r.len()),
            RecordState::Corrupt { raw_len } => Some(*raw_len),
            RecordState::External { raw } => Some(raw.len()),
            RecordState::Loaded(_) => None,
        }
    }

    /// Compression scheme used when this record was stored, if known
    pub fn compression(&self) -> Option<Compression> {
        self.compression.get()
    }

    /// The region currently holding this record
    pub fn owner(&self) -> Option<Rc<RecordStore>> {
        self.owner.borrow().upgrade()
    }

    pub(crate) fn set_owner(&self, owner: Weak<RecordStore>) {
        *self.owner.borrow_mut() = owner;
    }

    pub(crate) fn clear_owner(&self) {
        *self.owner.borrow_mut() = Weak::new();
    }

    /// Decode the payload if not done yet.
    ///
    /// Never fails: decode and read errors leave the record `Corrupt`, which
    /// is all tree-shape callers need. Use [`try_load`](Self::try_load) to
    /// see the error.
    pub fn load(&self) -> RecordStatus {
        let _ = self.try_load();
        self.status()
    }

    /// Decode the payload, returning the failure if there was one.
    ///
    /// Already loaded → the existing document. Corrupt or external → error
    /// without touching the disk.
    pub fn try_load(&self) -> Result<DocumentHandle> {
        match &*self.state.borrow() {
            RecordState::Loaded(doc) => return Ok(Rc::clone(doc)),
            RecordState::Corrupt { .. } => {
                return Err(TreeError::Decode(format!(
                    "record ({}, {}) is corrupt",
                    self.x, self.z
                )))
            }
            RecordState::External { .. } => {
                return Err(TreeError::InvalidState(format!(
                    "record ({}, {}) is stored externally",
                    self.x, self.z
                )))
            }
            RecordState::NotLoaded { .. } => {}
        }

        let raw = match self.raw_bytes() {
            Ok(raw) => raw,
            Err(e) => {
                warn!(x = self.x, z = self.z, "failed to read record: {}", e);
                *self.state.borrow_mut() = RecordState::Corrupt { raw_len: 0 };
                return Err(e);
            }
        };

        match self.decode(&raw) {
            Ok(doc) => {
                debug!(x = self.x, z = self.z, bytes = raw.len(), "record loaded");
                *self.state.borrow_mut() = RecordState::Loaded(Rc::clone(&doc));
                Ok(doc)
            }
            Err(e) => {
                warn!(x = self.x, z = self.z, "record is corrupt: {}", e);
                *self.state.borrow_mut() = RecordState::Corrupt { raw_len: raw.len() };
                Err(e)
            }
        }
    }

    /// Decode once to check the payload is plausible, keeping the record
    /// undecoded so its bytes still round-trip unchanged
    pub(crate) fn verify(&self) -> Result<()> {
        if self.status() != RecordStatus::NotLoaded {
            return Ok(());
        }
        let raw = self.raw_bytes()?;
        self.decode(&raw).map(|_| ())
    }

    /// Bytes to write for this record on save, `None` for corrupt records.
    ///
    /// Loaded records are re-encoded; records never loaded (and external
    /// ones) return their original body unchanged.
    pub fn save_bytes(&self) -> Result<Option<Bytes>> {
        match self.status() {
            RecordStatus::Corrupt => Ok(None),
            RecordStatus::NotLoaded | RecordStatus::External => self.raw_bytes().map(Some),
            RecordStatus::Loaded => {
                let doc = match self.document() {
                    Some(doc) => doc,
                    None => return Ok(None),
                };
                let compression = self.compression.get().unwrap_or_else(|| {
                    self.owner()
                        .map(|store| store.config().default_compression)
                        .unwrap_or(Compression::Zlib)
                });
                self.compression.set(Some(compression));
                let payload = self.codec.encode(compression, &doc)?;

                let mut body = Vec::with_capacity(BODY_HEADER_SIZE + payload.len());
                body.extend_from_slice(&((payload.len() + 1) as u32).to_be_bytes());
                body.push(compression.id());
                body.extend_from_slice(&payload);
                Ok(Some(Bytes::from(body)))
            }
        }
    }

    /// Pull the raw body into memory so it survives leaving its region
    pub(crate) fn capture_raw(&self) -> Result<()> {
        let on_disk_only = matches!(&*self.state.borrow(), RecordState::NotLoaded { raw: None });
        if !on_disk_only {
            return Ok(());
        }
        let raw = self.read_from_owner()?;
        *self.state.borrow_mut() = RecordState::NotLoaded { raw: Some(raw) };
        Ok(())
    }

    fn raw_bytes(&self) -> Result<Bytes> {
        let cached = match &*self.state.borrow() {
            RecordState::NotLoaded { raw: Some(raw) } => Some(raw.clone()),
            RecordState::External { raw } => Some(raw.clone()),
            _ => None,
        };
        match cached {
            Some(raw) => Ok(raw),
            None => self.read_from_owner(),
        }
    }

    fn read_from_owner(&self) -> Result<Bytes> {
        let owner = self.owner().ok_or_else(|| {
            TreeError::InvalidState(format!(
                "record ({}, {}) has no region to read from",
                self.x, self.z
            ))
        })?;
        owner.read_slot(self.x, self.z)
    }

    fn decode(&self, raw: &[u8]) -> Result<DocumentHandle> {
        let (len, compression_byte) = parse_body_header(raw).ok_or_else(|| {
            TreeError::Decode(format!("record body is only {} bytes", raw.len()))
        })?;
        if len == 0 || 4 + len > raw.len() {
            return Err(TreeError::Decode(format!(
                "record length {} does not fit its {} byte body",
                len,
                raw.len()
            )));
        }
        let compression = Compression::from_id(compression_byte).ok_or_else(|| {
            TreeError::Decode(format!("unknown compression scheme {}", compression_byte))
        })?;
        self.compression.set(Some(compression));
        self.codec
            .decode(compression, &raw[BODY_HEADER_SIZE..4 + len])
    }
}

pub(crate) fn check_coords(x: usize, z: usize) -> Result<()> {
    if x >= REGION_DIM || z >= REGION_DIM {
        return Err(TreeError::InvalidState(format!(
            "coordinates ({}, {}) are outside the {}x{} grid",
            x, z, REGION_DIM, REGION_DIM
        )));
    }
    Ok(())
}

/// Convenience for building an in-memory record around an empty document
pub fn empty_record(x: usize, z: usize) -> Result<RecordHandle> {
    LazyRecord::new(x, z, Document::empty())
}
