//! # tagtree
//!
//! Browse and edit tagged-value documents, standalone or packed into
//! sector-addressed region archives, with:
//! - Lazy per-record decode and corruption isolation
//! - Full-repack saves that byte-preserve untouched records
//! - A generic tree that reconciles against live objects on access
//! - Undo/redo with nested batches
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Session                              │
//! │            (roots, undo history, notify after edit)          │
//! └──────────────┬──────────────────────────────┬───────────────┘
//!                │                              │
//!                ▼                              ▼
//!   ┌────────────────────────┐      ┌────────────────────────┐
//!   │   TreeModel / Nodes    │      │      UndoHistory       │
//!   │ (pull reconciliation)  │      │  (edit → actions)      │
//!   └───────────┬────────────┘      └───────────┬────────────┘
//!               │ children() may load           │ mutate
//!               ▼                               ▼
//!   ┌─────────────────────────────────────────────────────────┐
//!   │      RecordStore ── LazyRecord ── Document / NbtTag      │
//!   │   (sector table)    (NotLoaded → Loaded | Corrupt)      │
//!   └─────────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod nbt;
pub mod region;
pub mod tree;
pub mod history;
pub mod edit;
pub mod session;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, TreeError};
pub use config::Config;
pub use history::{HistoryEvent, UndoHistory, UndoableAction};
pub use nbt::{Document, DocumentHandle, NbtFile, NbtTag, TagHandle, TagKind, TagValue};
pub use region::{LazyRecord, RecordHandle, RecordStatus, RecordStore, SectorTable, StoreHandle};
pub use session::Session;
pub use tree::{Backing, CancellationToken, ChangeEvent, NodeRegistry, TreeModel, TreeNode};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of tagtree
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
