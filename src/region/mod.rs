//! Region Module
//!
//! Sector-addressed archive files holding up to 1024 independently
//! compressed records on a 32×32 grid.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Sector 0: location table (1024 × u32 BE)    │
//! ├─────────────────────────────────────────────┤
//! │ Sector 1: timestamp table (1024 × i32 BE)   │
//! ├─────────────────────────────────────────────┤
//! │ Sector 2..: record bodies                   │
//! │   [len u32 BE][compression u8][payload]     │
//! │   each padded to a whole number of sectors  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Components
//! - `sector_table` - header tables and their validation
//! - `record` - lazily decoded record handles
//! - `store` - slot ownership, open and repacking save

mod record;
mod sector_table;
mod store;

pub use record::{empty_record, parse_body_header, LazyRecord, RecordHandle, RecordStatus, BODY_HEADER_SIZE, EXTERNAL_FLAG};
pub use sector_table::{sectors_for, slot_index, SectorTable, SlotEntry, TABLES_SIZE};
pub use store::{RecordStore, StoreHandle};

/// Bytes per sector
pub const SECTOR_SIZE: usize = 4096;

/// Records per region edge
pub const REGION_DIM: usize = 32;

/// Record slots per region
pub const SLOT_COUNT: usize = REGION_DIM * REGION_DIM;

/// Sectors taken by the header tables
pub const HEADER_SECTORS: u32 = 2;
