//! Tree model
//!
//! The set of root nodes plus the notify entry points that turn "this object
//! changed" into [`ChangeEvent`]s.
//!
//! ## Notify Flow
//! ```text
//! notify(obj) ─▶ find node (BFS over reconciled nodes)
//!             ─▶ Changed
//!             ─▶ reconcile node, diff old vs new children
//!             ─▶ NodesChanged, then NodesRemoved / NodesAdded if any
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::mpsc::Receiver;

use tracing::debug;

use crate::error::Result;

use super::backing::Backing;
use super::bus::{ChangeBus, ChangeEvent};
use super::node::{TreeNode, TreePath};
use super::registry::NodeRegistry;

/// Root nodes of one view plus its change bus
pub struct TreeModel {
    registry: Rc<NodeRegistry>,
    roots: RefCell<Vec<TreeNode>>,
    bus: ChangeBus,
}

impl Default for TreeModel {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeModel {
    /// A model using the built-in node kinds
    pub fn new() -> Self {
        Self::with_registry(NodeRegistry::with_defaults())
    }

    pub fn with_registry(registry: NodeRegistry) -> Self {
        Self {
            registry: Rc::new(registry),
            roots: RefCell::new(Vec::new()),
            bus: ChangeBus::new(),
        }
    }

    pub fn registry(&self) -> &Rc<NodeRegistry> {
        &self.registry
    }

    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        self.bus.subscribe()
    }

    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    pub fn roots(&self) -> Vec<TreeNode> {
        self.roots.borrow().clone()
    }

    /// Append a root for `backing`; a lone root starts expanded
    pub fn add_root(&self, backing: Backing) -> Result<TreeNode> {
        let node = TreeNode::new_root(backing, Rc::clone(&self.registry))?;
        let index = {
            let mut roots = self.roots.borrow_mut();
            roots.push(node.clone());
            roots.len() - 1
        };
        if index == 0 {
            node.set_expanded(true);
        }

        self.bus.emit(ChangeEvent::Changed);
        self.bus.emit(ChangeEvent::NodesAdded {
            parent: TreePath::empty(),
            indices: vec![index],
            nodes: vec![node.clone()],
        });
        Ok(node)
    }

    /// Locate the node presenting `target` among already reconciled nodes.
    ///
    /// A document root tag resolves to the file or loaded record presenting
    /// it, since those nodes stand in for their root compound.
    pub fn find_node(&self, target: &Backing) -> Option<TreeNode> {
        if let Some(node) = self.search(|node| node.backing() == target) {
            return Some(node);
        }
        let tag = target.as_tag()?;
        self.search(|node| node.backing().presents_root(tag))
    }

    fn search<P>(&self, predicate: P) -> Option<TreeNode>
    where
        P: Fn(&TreeNode) -> bool,
    {
        let mut queue: VecDeque<TreeNode> = self.roots().into();
        while let Some(node) = queue.pop_front() {
            if predicate(&node) {
                return Some(node);
            }
            queue.extend(node.cached_children());
        }
        None
    }

    /// Tell the view `changed` was mutated. Returns false when no node for
    /// it has been materialized yet, in which case nothing is emitted.
    pub fn notify(&self, changed: &Backing) -> Result<bool> {
        let node = match self.find_node(changed) {
            Some(node) => node,
            None => {
                debug!(?changed, "no node for changed object, not updating model");
                return Ok(false);
            }
        };
        self.bus.emit(ChangeEvent::Changed);
        self.sync(&node)?;
        self.refresh_ancestor_counts(&node)?;
        Ok(true)
    }

    /// Tell the view `removed` is gone. Roots are dropped from the model.
    pub fn remove(&self, removed: &Backing) -> bool {
        let node = match self.find_node(removed) {
            Some(node) => node,
            None => return false,
        };

        let was_root = {
            let mut roots = self.roots.borrow_mut();
            let before = roots.len();
            roots.retain(|root| !root.ptr_eq(&node));
            roots.len() != before
        };
        let parent = if was_root {
            TreePath::empty()
        } else {
            node.path().parent()
        };

        self.bus.emit(ChangeEvent::NodesRemoved {
            parent,
            nodes: vec![node],
        });
        self.bus.emit(ChangeEvent::Changed);
        true
    }

    /// Drop a root node; false if `removed` is not a root
    pub fn remove_root(&self, removed: &Backing) -> bool {
        let is_root = self.roots.borrow().iter().any(|r| r.backing() == removed);
        is_root && self.remove(removed)
    }

    /// Ask the view to re-read everything below `target` (the whole tree
    /// for `None`)
    pub fn notify_structure(&self, target: Option<&Backing>) {
        let path = target
            .and_then(|backing| self.find_node(backing))
            .map(|node| node.path())
            .unwrap_or_default();
        self.bus.emit(ChangeEvent::StructureChanged { path });
    }

    /// Resync every expanded node, e.g. after undo or redo where the
    /// mutated objects are not known individually
    pub fn refresh(&self) -> Result<()> {
        self.bus.emit(ChangeEvent::Changed);
        for root in self.roots() {
            self.refresh_expanded(&root)?;
        }
        Ok(())
    }

    fn refresh_expanded(&self, node: &TreeNode) -> Result<()> {
        if !node.is_expanded() {
            return Ok(());
        }
        self.sync(node)?;
        for child in node.cached_children() {
            self.refresh_expanded(&child)?;
        }
        // children may have changed their counts
        node.refresh_children()?;
        Ok(())
    }

    /// Reconcile `node` and emit the row-level differences
    fn sync(&self, node: &TreeNode) -> Result<()> {
        let path = node.path();
        let before = node.cached_children();
        node.refresh_children()?;
        let after = node.cached_children();

        let removed: Vec<TreeNode> = before
            .iter()
            .filter(|old| !after.iter().any(|new| new.ptr_eq(old)))
            .cloned()
            .collect();
        let (indices, added): (Vec<usize>, Vec<TreeNode>) = after
            .iter()
            .enumerate()
            .filter(|(_, new)| !before.iter().any(|old| old.ptr_eq(new)))
            .map(|(index, new)| (index, new.clone()))
            .unzip();

        self.bus.emit(ChangeEvent::NodesChanged {
            parent: path.parent(),
            node: node.clone(),
        });
        if !removed.is_empty() {
            self.bus.emit(ChangeEvent::NodesRemoved {
                parent: path.clone(),
                nodes: removed,
            });
        }
        if !added.is_empty() {
            self.bus.emit(ChangeEvent::NodesAdded {
                parent: path,
                indices,
                nodes: added,
            });
            node.set_expanded(true);
        }
        Ok(())
    }

    fn refresh_ancestor_counts(&self, node: &TreeNode) -> Result<()> {
        let mut current = node.parent();
        while let Some(ancestor) = current {
            ancestor.refresh_children()?;
            current = ancestor.parent();
        }
        Ok(())
    }

    /// True when any root archive, file or record holds unsaved edits
    pub fn has_unsaved_changes(&self) -> bool {
        self.roots().iter().any(|root| match root.backing() {
            Backing::Archive(store) => store.has_unsaved_changes(),
            Backing::File(file) => file.has_unsaved_changes(),
            Backing::Record(record) => record.document().map_or(false, |d| d.is_dirty()),
            Backing::Tag(_) => false,
        })
    }
}
