//! Backing objects
//!
//! Everything a tree node can wrap. Equality and hashing go by allocation,
//! so two `Backing`s are equal only when they refer to the same object.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::nbt::{DocumentHandle, FileHandle, TagHandle};
use crate::region::{RecordHandle, StoreHandle};

/// Runtime kind of a backing object, the key of the node registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackingKind {
    Archive,
    Record,
    File,
    Tag,
}

/// An object presented as a tree position
#[derive(Clone)]
pub enum Backing {
    Archive(StoreHandle),
    Record(RecordHandle),
    File(FileHandle),
    Tag(TagHandle),
}

impl Backing {
    pub fn kind(&self) -> BackingKind {
        match self {
            Backing::Archive(_) => BackingKind::Archive,
            Backing::Record(_) => BackingKind::Record,
            Backing::File(_) => BackingKind::File,
            Backing::Tag(_) => BackingKind::Tag,
        }
    }

    /// Address of the wrapped allocation
    fn addr(&self) -> *const () {
        match self {
            Backing::Archive(store) => Rc::as_ptr(store).cast(),
            Backing::Record(record) => Rc::as_ptr(record).cast(),
            Backing::File(file) => Rc::as_ptr(file).cast(),
            Backing::Tag(tag) => Rc::as_ptr(tag).cast(),
        }
    }

    /// Document whose root this object stands in for, if any.
    ///
    /// Never triggers a record load.
    pub fn document(&self) -> Option<DocumentHandle> {
        match self {
            Backing::Record(record) => record.document(),
            Backing::File(file) => Some(Rc::clone(file.document())),
            _ => None,
        }
    }

    /// True when this object presents `tag` as its own content (a file or
    /// loaded record whose document root is `tag`)
    pub fn presents_root(&self, tag: &TagHandle) -> bool {
        self.document()
            .map_or(false, |doc| Rc::ptr_eq(doc.root(), tag))
    }

    pub fn as_tag(&self) -> Option<&TagHandle> {
        match self {
            Backing::Tag(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordHandle> {
        match self {
            Backing::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_archive(&self) -> Option<&StoreHandle> {
        match self {
            Backing::Archive(store) => Some(store),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileHandle> {
        match self {
            Backing::File(file) => Some(file),
            _ => None,
        }
    }
}

impl PartialEq for Backing {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.addr() == other.addr()
    }
}

impl Eq for Backing {}

impl Hash for Backing {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        self.addr().hash(state);
    }
}

impl fmt::Debug for Backing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backing::Archive(store) => write!(f, "Archive({})", store.display_name()),
            Backing::Record(record) => write!(f, "Record({}, {})", record.x(), record.z()),
            Backing::File(file) => write!(f, "File({})", file.display_name()),
            Backing::Tag(tag) => write!(f, "Tag({})", tag.borrow()),
        }
    }
}

impl From<StoreHandle> for Backing {
    fn from(store: StoreHandle) -> Self {
        Backing::Archive(store)
    }
}

impl From<RecordHandle> for Backing {
    fn from(record: RecordHandle) -> Self {
        Backing::Record(record)
    }
}

impl From<FileHandle> for Backing {
    fn from(file: FileHandle) -> Self {
        Backing::File(file)
    }
}

impl From<TagHandle> for Backing {
    fn from(tag: TagHandle) -> Self {
        Backing::Tag(tag)
    }
}
