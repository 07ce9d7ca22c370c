//! Tag model
//!
//! Shared, mutable tagged values. Every tag lives behind a [`TagHandle`]
//! (`Rc<RefCell<NbtTag>>`); two handles denote the same tag only when they
//! point at the same allocation, which is what the tree keys nodes on.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TreeError};

/// Shared handle to a tag
pub type TagHandle = Rc<RefCell<NbtTag>>;

/// Runtime kind of a tag value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagKind {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
    ByteArray,
    IntArray,
    LongArray,
    List,
    Compound,
}

impl TagKind {
    /// Human-readable name, as shown in previews
    pub fn display_name(self) -> &'static str {
        match self {
            TagKind::Byte => "Byte",
            TagKind::Short => "Short",
            TagKind::Int => "Int",
            TagKind::Long => "Long",
            TagKind::Float => "Float",
            TagKind::Double => "Double",
            TagKind::String => "String",
            TagKind::ByteArray => "Byte Array",
            TagKind::IntArray => "Int Array",
            TagKind::LongArray => "Long Array",
            TagKind::List => "List",
            TagKind::Compound => "Compound",
        }
    }

    pub fn is_container(self) -> bool {
        matches!(self, TagKind::List | TagKind::Compound)
    }
}

/// Value carried by a tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TagValue {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    ByteArray(Vec<i8>),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
    /// Unnamed items of one kind; `kind` is `None` until the first insert
    List {
        kind: Option<TagKind>,
        items: Vec<TagHandle>,
    },
    /// Named children, names unique within the compound
    Compound(Vec<TagHandle>),
}

impl TagValue {
    pub fn kind(&self) -> TagKind {
        match self {
            TagValue::Byte(_) => TagKind::Byte,
            TagValue::Short(_) => TagKind::Short,
            TagValue::Int(_) => TagKind::Int,
            TagValue::Long(_) => TagKind::Long,
            TagValue::Float(_) => TagKind::Float,
            TagValue::Double(_) => TagKind::Double,
            TagValue::String(_) => TagKind::String,
            TagValue::ByteArray(_) => TagKind::ByteArray,
            TagValue::IntArray(_) => TagKind::IntArray,
            TagValue::LongArray(_) => TagKind::LongArray,
            TagValue::List { .. } => TagKind::List,
            TagValue::Compound(_) => TagKind::Compound,
        }
    }

    /// An empty compound value
    pub fn compound() -> Self {
        TagValue::Compound(Vec::new())
    }

    /// An empty list value with no element kind yet
    pub fn list() -> Self {
        TagValue::List {
            kind: None,
            items: Vec::new(),
        }
    }
}

/// A single tag: optional name plus value
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct NbtTag {
    pub name: Option<String>,
    pub value: TagValue,
}

impl NbtTag {
    /// Create a named tag (compound member) behind a fresh handle
    pub fn named(name: impl Into<String>, value: TagValue) -> TagHandle {
        Rc::new(RefCell::new(NbtTag {
            name: Some(name.into()),
            value,
        }))
    }

    /// Create an unnamed tag (list item) behind a fresh handle
    pub fn unnamed(value: TagValue) -> TagHandle {
        Rc::new(RefCell::new(NbtTag { name: None, value }))
    }

    pub fn kind(&self) -> TagKind {
        self.value.kind()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Direct children (compound members or list items), empty for values
    pub fn children(&self) -> Vec<TagHandle> {
        match &self.value {
            TagValue::Compound(children) => children.clone(),
            TagValue::List { items, .. } => items.clone(),
            _ => Vec::new(),
        }
    }

    pub fn child_count(&self) -> usize {
        match &self.value {
            TagValue::Compound(children) => children.len(),
            TagValue::List { items, .. } => items.len(),
            _ => 0,
        }
    }

    /// Look up a compound member by name
    pub fn get(&self, name: &str) -> Option<TagHandle> {
        match &self.value {
            TagValue::Compound(children) => children
                .iter()
                .find(|c| c.borrow().name.as_deref() == Some(name))
                .cloned(),
            _ => None,
        }
    }

    /// Position of `child` among this tag's children (by identity)
    pub fn index_of(&self, child: &TagHandle) -> Option<usize> {
        match &self.value {
            TagValue::Compound(children) => children.iter().position(|c| Rc::ptr_eq(c, child)),
            TagValue::List { items, .. } => items.iter().position(|c| Rc::ptr_eq(c, child)),
            _ => None,
        }
    }

    /// Check that `child` may be inserted here, ignoring `child` itself if
    /// it is already a member (moves within one container)
    pub fn check_insertable(&self, child: &NbtTag, child_handle: &TagHandle) -> Result<()> {
        match &self.value {
            TagValue::Compound(children) => {
                let name = child.name.as_deref().ok_or_else(|| {
                    TreeError::InvalidState("compound members must be named".to_string())
                })?;
                let clash = children.iter().any(|c| {
                    !Rc::ptr_eq(c, child_handle) && c.borrow().name.as_deref() == Some(name)
                });
                if clash {
                    return Err(TreeError::InvalidState(format!(
                        "compound already has a tag named '{}'",
                        name
                    )));
                }
                Ok(())
            }
            TagValue::List { kind, items } => {
                if child.name.is_some() {
                    return Err(TreeError::InvalidState(
                        "list items must be unnamed".to_string(),
                    ));
                }
                let only_self = items.len() == 1 && Rc::ptr_eq(&items[0], child_handle);
                match kind {
                    Some(kind) if *kind != child.kind() && !items.is_empty() && !only_self => {
                        Err(TreeError::InvalidState(format!(
                            "cannot add {} to a list of {}",
                            child.kind().display_name(),
                            kind.display_name()
                        )))
                    }
                    _ => Ok(()),
                }
            }
            _ => Err(TreeError::InvalidState(format!(
                "{} tags cannot hold children",
                self.kind().display_name()
            ))),
        }
    }

    /// Produce an independent copy with fresh handles all the way down
    pub fn deep_clone(&self) -> NbtTag {
        let value = match &self.value {
            TagValue::Compound(children) => TagValue::Compound(
                children
                    .iter()
                    .map(|c| Rc::new(RefCell::new(c.borrow().deep_clone())))
                    .collect(),
            ),
            TagValue::List { kind, items } => TagValue::List {
                kind: *kind,
                items: items
                    .iter()
                    .map(|c| Rc::new(RefCell::new(c.borrow().deep_clone())))
                    .collect(),
            },
            other => other.clone(),
        };
        NbtTag {
            name: self.name.clone(),
            value,
        }
    }

    /// Short value summary, e.g. `[3 entries]` or `42`
    pub fn preview_value(&self) -> String {
        match &self.value {
            TagValue::Compound(children) => {
                format!("[{}]", pluralize(children.len(), "entry", "entries"))
            }
            TagValue::List { kind, items } => match kind {
                Some(kind) if !items.is_empty() => {
                    let word = kind.display_name().to_lowercase();
                    format!("[{}]", pluralize(items.len(), &word, &format!("{}s", word)))
                }
                _ => "[0 entries]".to_string(),
            },
            TagValue::ByteArray(v) => format!("[{}]", pluralize(v.len(), "byte", "bytes")),
            TagValue::IntArray(v) => format!("[{}]", pluralize(v.len(), "int", "ints")),
            TagValue::LongArray(v) => format!("[{}]", pluralize(v.len(), "long", "longs")),
            TagValue::Byte(v) => v.to_string(),
            TagValue::Short(v) => v.to_string(),
            TagValue::Int(v) => v.to_string(),
            TagValue::Long(v) => v.to_string(),
            TagValue::Float(v) => v.to_string(),
            TagValue::Double(v) => v.to_string(),
            TagValue::String(s) => format!("\"{}\"", s),
        }
    }

    /// Control characters in a name usually mean the bytes were decoded with
    /// the wrong format
    pub fn looks_suspicious(&self) -> bool {
        let bad = |name: Option<&str>| name.map_or(false, |n| n.chars().any(char::is_control));
        bad(self.name()) || self.children().iter().any(|c| bad(c.borrow().name()))
    }
}

impl fmt::Display for NbtTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) if !name.is_empty() => write!(f, "{}: {}", name, self.preview_value()),
            _ => write!(f, "{}", self.preview_value()),
        }
    }
}

// =============================================================================
// Container Operations
// =============================================================================

/// Insert `child` into `container` at `index` (clamped to the end).
///
/// Lists adopt the kind of their first item. A tag already held by
/// `container` is rejected; take it out first to reorder it.
pub fn insert_child(container: &TagHandle, index: usize, child: TagHandle) -> Result<usize> {
    if Rc::ptr_eq(container, &child) || is_ancestor(&child, container) {
        return Err(TreeError::InvalidState(
            "a tag cannot be inserted into itself".to_string(),
        ));
    }
    if container.borrow().index_of(&child).is_some() {
        return Err(TreeError::InvalidState(
            "tag already has a parent".to_string(),
        ));
    }
    let (child_kind, check) = {
        let child_ref = child.borrow();
        let check = container.borrow().check_insertable(&child_ref, &child);
        (child_ref.kind(), check)
    };
    check?;

    let mut parent = container.borrow_mut();
    match &mut parent.value {
        TagValue::Compound(children) => {
            let at = index.min(children.len());
            children.insert(at, child);
            Ok(at)
        }
        TagValue::List { kind, items } => {
            if items.is_empty() {
                *kind = Some(child_kind);
            }
            let at = index.min(items.len());
            items.insert(at, child);
            Ok(at)
        }
        _ => Err(TreeError::InvalidState(
            "tag cannot hold children".to_string(),
        )),
    }
}

/// Remove `child` from `container`, returning its former index
pub fn remove_child(container: &TagHandle, child: &TagHandle) -> Option<usize> {
    let mut parent = container.borrow_mut();
    match &mut parent.value {
        TagValue::Compound(children) => {
            let at = children.iter().position(|c| Rc::ptr_eq(c, child))?;
            children.remove(at);
            Some(at)
        }
        TagValue::List { items, .. } => {
            let at = items.iter().position(|c| Rc::ptr_eq(c, child))?;
            items.remove(at);
            Some(at)
        }
        _ => None,
    }
}

/// Find the container directly holding `target`, searching below `root`
pub fn find_parent(root: &TagHandle, target: &TagHandle) -> Option<TagHandle> {
    let mut stack = vec![root.clone()];
    while let Some(current) = stack.pop() {
        let children = current.borrow().children();
        if children.iter().any(|c| Rc::ptr_eq(c, target)) {
            return Some(current);
        }
        stack.extend(children);
    }
    None
}

/// True when `candidate` appears somewhere below `ancestor`
pub fn is_ancestor(ancestor: &TagHandle, candidate: &TagHandle) -> bool {
    find_parent(ancestor, candidate).is_some()
}

fn pluralize(count: usize, word: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, word)
    } else {
        format!("{} {}", count, plural)
    }
}
