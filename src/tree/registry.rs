//! Node registry
//!
//! Maps each [`BackingKind`] to the capability set nodes of that kind use.
//! This is where a presentation layer swaps in its own behaviour for a kind
//! without the tree depending on it.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{Result, TreeError};

use super::backing::{Backing, BackingKind};
use super::kinds::{ArchiveNodes, FileNodes, Icon, RecordNodes, TagNodes};

/// Kind-specific behaviour of a tree node
pub trait NodeKind {
    /// Live children of `backing`, in display order. May load records.
    fn children(&self, backing: &Backing) -> Vec<Backing>;

    /// Cheap check for an expander; must not load anything it can avoid
    fn has_children(&self, backing: &Backing) -> bool {
        !self.children(backing).is_empty()
    }

    fn preview_name(&self, backing: &Backing) -> String;

    fn preview_value(&self, backing: &Backing) -> String;

    fn icon(&self, backing: &Backing) -> Icon;
}

/// Kind → behaviour table shared by every node of one tree
#[derive(Default)]
pub struct NodeRegistry {
    kinds: HashMap<BackingKind, Rc<dyn NodeKind>>,
}

impl NodeRegistry {
    /// A registry with nothing registered
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in behaviour for all four kinds
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(BackingKind::Archive, Rc::new(ArchiveNodes));
        registry.register(BackingKind::Record, Rc::new(RecordNodes));
        registry.register(BackingKind::File, Rc::new(FileNodes));
        registry.register(BackingKind::Tag, Rc::new(TagNodes));
        registry
    }

    /// Register `behaviour` for `kind`, returning what it replaced
    pub fn register(
        &mut self,
        kind: BackingKind,
        behaviour: Rc<dyn NodeKind>,
    ) -> Option<Rc<dyn NodeKind>> {
        self.kinds.insert(kind, behaviour)
    }

    pub fn get(&self, kind: BackingKind) -> Result<Rc<dyn NodeKind>> {
        self.kinds.get(&kind).cloned().ok_or_else(|| {
            TreeError::InvalidState(format!("no node kind registered for {:?}", kind))
        })
    }

    pub fn contains(&self, kind: BackingKind) -> bool {
        self.kinds.contains_key(&kind)
    }
}
