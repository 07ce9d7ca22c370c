//! Document
//!
//! A root tag plus a dirty flag. Documents are shared by reference between
//! the record or file that owns them, tree nodes, and undo closures.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::tag::{self, NbtTag, TagHandle, TagValue};

/// Shared handle to a document
pub type DocumentHandle = Rc<Document>;

/// A standalone tagged-value tree
#[derive(Debug)]
pub struct Document {
    root: TagHandle,
    dirty: Cell<bool>,
}

impl Document {
    /// Wrap an existing root tag; the document starts clean
    pub fn new(root: TagHandle) -> DocumentHandle {
        Rc::new(Self {
            root,
            dirty: Cell::new(false),
        })
    }

    /// A document with an empty, empty-named compound root
    pub fn empty() -> DocumentHandle {
        Self::new(NbtTag::named("", TagValue::compound()))
    }

    /// Build a document from an owned tag
    pub fn from_tag(root: NbtTag) -> DocumentHandle {
        Self::new(Rc::new(RefCell::new(root)))
    }

    pub fn root(&self) -> &TagHandle {
        &self.root
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub fn mark_dirty(&self) {
        self.dirty.set(true);
    }

    pub fn mark_clean(&self) {
        self.dirty.set(false);
    }

    /// Container holding `target`, or `None` for the root and foreign tags
    pub fn parent_of(&self, target: &TagHandle) -> Option<TagHandle> {
        tag::find_parent(&self.root, target)
    }

    /// True when `target` is the root or any tag below it
    pub fn contains(&self, target: &TagHandle) -> bool {
        Rc::ptr_eq(&self.root, target) || self.parent_of(target).is_some()
    }

    /// Structural equality of two documents' contents
    pub fn same_content(&self, other: &Document) -> bool {
        *self.root.borrow() == *other.root.borrow()
    }
}
