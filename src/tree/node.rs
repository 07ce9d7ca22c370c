//! Tree Node
//!
//! One generic node type wraps every backing object. Its kind-specific
//! behaviour comes from the [`NodeRegistry`].
//!
//! ## Reconciliation
//! ```text
//! children()
//!   │
//!   ├─ live = kind.children(backing)        (may load a record)
//!   ├─ for each live object:
//!   │     cached node with same backing?  ──yes──▶ reuse
//!   │                                     ──no───▶ create via registry
//!   ├─ cached nodes not in live ──▶ evict, clear their parent link
//!   └─ descendants = Σ(child.descendants + 1)
//! ```
//! Reconciliation only happens on access. Mutating a backing object never
//! touches nodes directly; owners call `TreeModel::notify` afterwards.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::Result;

use super::backing::Backing;
use super::kinds::Icon;
use super::registry::{NodeKind, NodeRegistry};

struct NodeInner {
    backing: Backing,
    kind: Rc<dyn NodeKind>,
    registry: Rc<NodeRegistry>,
    parent: RefCell<Weak<NodeInner>>,
    children: RefCell<Vec<TreeNode>>,
    descendants: Cell<usize>,
    expanded: Cell<bool>,
}

/// Shared handle to a node; clones refer to the same node
#[derive(Clone)]
pub struct TreeNode(Rc<NodeInner>);

impl TreeNode {
    /// A parentless node for `backing`
    pub fn new_root(backing: Backing, registry: Rc<NodeRegistry>) -> Result<Self> {
        Self::create(backing, registry, Weak::new())
    }

    fn create(backing: Backing, registry: Rc<NodeRegistry>, parent: Weak<NodeInner>) -> Result<Self> {
        let kind = registry.get(backing.kind())?;
        Ok(Self(Rc::new(NodeInner {
            backing,
            kind,
            registry,
            parent: RefCell::new(parent),
            children: RefCell::new(Vec::new()),
            descendants: Cell::new(0),
            expanded: Cell::new(false),
        })))
    }

    pub fn backing(&self) -> &Backing {
        &self.0.backing
    }

    pub fn registry(&self) -> &Rc<NodeRegistry> {
        &self.0.registry
    }

    /// `None` for roots and for nodes evicted from their parent
    pub fn parent(&self) -> Option<TreeNode> {
        self.0.parent.borrow().upgrade().map(TreeNode)
    }

    /// Reconciled children in display order
    pub fn children(&self) -> Result<Vec<TreeNode>> {
        self.refresh_children()?;
        Ok(self.cached_children())
    }

    /// Children as of the last reconciliation, without touching the backing
    pub fn cached_children(&self) -> Vec<TreeNode> {
        self.0.children.borrow().clone()
    }

    /// Reconcile against the backing object; true when the child list changed
    pub fn refresh_children(&self) -> Result<bool> {
        let live = self.0.kind.children(&self.0.backing);
        let previous = self.cached_children();
        let mut cache: HashMap<Backing, TreeNode> = previous
            .iter()
            .map(|node| (node.backing().clone(), node.clone()))
            .collect();

        let mut next = Vec::with_capacity(live.len());
        for backing in live {
            let node = match cache.remove(&backing) {
                Some(node) => node,
                None => Self::create(
                    backing,
                    Rc::clone(&self.0.registry),
                    Rc::downgrade(&self.0),
                )?,
            };
            next.push(node);
        }

        let changed = !cache.is_empty()
            || previous.len() != next.len()
            || previous.iter().zip(&next).any(|(a, b)| !a.ptr_eq(b));

        for evicted in cache.into_values() {
            *evicted.0.parent.borrow_mut() = Weak::new();
        }

        let descendants = next.iter().map(|child| child.descendant_count() + 1).sum();
        self.0.descendants.set(descendants);
        *self.0.children.borrow_mut() = next;
        Ok(changed)
    }

    /// Nodes below this one as of the last reconciliation of each level
    pub fn descendant_count(&self) -> usize {
        self.0.descendants.get()
    }

    pub fn has_children(&self) -> bool {
        self.0.kind.has_children(&self.0.backing)
    }

    pub fn preview_name(&self) -> String {
        self.0.kind.preview_name(&self.0.backing)
    }

    pub fn preview_value(&self) -> String {
        self.0.kind.preview_value(&self.0.backing)
    }

    pub fn icon(&self) -> Icon {
        self.0.kind.icon(&self.0.backing)
    }

    pub fn is_expanded(&self) -> bool {
        self.0.expanded.get()
    }

    pub fn set_expanded(&self, expanded: bool) {
        self.0.expanded.set(expanded);
    }

    /// Root-first chain of nodes ending at this one
    pub fn path(&self) -> TreePath {
        let mut nodes = vec![self.clone()];
        let mut current = self.parent();
        while let Some(node) = current {
            current = node.parent();
            nodes.push(node);
        }
        nodes.reverse();
        TreePath(nodes)
    }

    /// Node identity, not backing equality
    pub fn ptr_eq(&self, other: &TreeNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for TreeNode {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for TreeNode {}

impl fmt::Debug for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeNode")
            .field("backing", &self.0.backing)
            .field("descendants", &self.descendant_count())
            .finish()
    }
}

/// Root-first sequence of nodes; the empty path denotes the invisible
/// top level above all roots
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TreePath(Vec<TreeNode>);

impl TreePath {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.0
    }

    pub fn last(&self) -> Option<&TreeNode> {
        self.0.last()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The path without its last node
    pub fn parent(&self) -> TreePath {
        let mut nodes = self.0.clone();
        nodes.pop();
        TreePath(nodes)
    }
}
