//! NBT Module
//!
//! The tagged-value model the rest of the crate manipulates, plus the
//! interfaces to its serialized forms.
//!
//! ## Responsibilities
//! - Shared, identity-bearing tags (`Rc<RefCell<NbtTag>>`)
//! - Dirty-tracked documents
//! - File-backed documents with multi-strategy open
//! - Pluggable record payload codecs
//!
//! The textual grammar (SNBT) is not implemented here; it plugs in as
//! another [`DocumentFormat`].

mod codec;
mod document;
mod file;
pub mod tag;

pub use codec::{BincodeCodec, Compression, RecordCodec};
pub use document::{Document, DocumentHandle};
pub use file::{default_formats, pick_first_plausible, BincodeFormat, DocumentFormat, FileHandle, NbtFile};
pub use tag::{NbtTag, TagHandle, TagKind, TagValue};
