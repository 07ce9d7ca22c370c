//! Tests for TreeNode reconciliation
//!
//! These tests verify:
//! - Reconciling an unchanged object reuses the same node instances
//! - Descendant counts follow the reconciled subtree
//! - Record nodes load lazily and answer has_children without loading
//! - Evicted nodes lose their parent link
//! - Registry overrides and missing kinds
//! - Cancellable whole-subtree expansion

use std::cell::Cell;
use std::rc::Rc;

use tagtree::nbt::tag::{insert_child, remove_child};
use tagtree::tree::{BackingKind, Icon, NodeKind, TagNodes};
use tagtree::{
    Backing, CancellationToken, Document, LazyRecord, NbtFile, NbtTag, NodeRegistry,
    RecordStatus, RecordStore, TagValue, TreeError, TreeNode,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn registry() -> Rc<NodeRegistry> {
    Rc::new(NodeRegistry::with_defaults())
}

/// root { a: 1, b: { c: 2, d: [3, 4] } }
fn sample_document() -> tagtree::DocumentHandle {
    let doc = Document::empty();
    insert_child(doc.root(), 0, NbtTag::named("a", TagValue::Int(1))).unwrap();
    let b = NbtTag::named("b", TagValue::compound());
    insert_child(&b, 0, NbtTag::named("c", TagValue::Int(2))).unwrap();
    let d = NbtTag::named("d", TagValue::list());
    insert_child(&d, 0, NbtTag::unnamed(TagValue::Int(3))).unwrap();
    insert_child(&d, 1, NbtTag::unnamed(TagValue::Int(4))).unwrap();
    insert_child(&b, 1, d).unwrap();
    insert_child(doc.root(), 1, b).unwrap();
    doc
}

fn saved_region(temp: &TempDir, coords: &[(usize, usize)]) -> std::path::PathBuf {
    let path = temp.path().join("r.0.0.mca");
    let store = RecordStore::create_empty();
    for (x, z) in coords {
        store
            .add_record(LazyRecord::new(*x, *z, sample_document()).unwrap())
            .unwrap();
    }
    store.save_as(&path).unwrap();
    path
}

// =============================================================================
// Reconciliation
// =============================================================================

#[test]
fn test_reconcile_without_change_reuses_nodes() {
    let file = NbtFile::new(sample_document());
    let root = TreeNode::new_root(Backing::File(file), registry()).unwrap();

    let first = root.children().unwrap();
    let changed = root.refresh_children().unwrap();
    let second = root.children().unwrap();

    assert!(!changed);
    assert_eq!(first.len(), 2);
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert!(a.ptr_eq(b));
    }
}

#[test]
fn test_reconcile_picks_up_inserted_and_removed_children() {
    let file = NbtFile::new(sample_document());
    let doc = Rc::clone(file.document());
    let root = TreeNode::new_root(Backing::File(file), registry()).unwrap();
    let before = root.children().unwrap();

    let e = NbtTag::named("e", TagValue::Byte(0));
    insert_child(doc.root(), 0, Rc::clone(&e)).unwrap();
    let after = root.children().unwrap();

    assert_eq!(after.len(), 3);
    assert_eq!(after[0].backing(), &Backing::Tag(e));
    // existing nodes survive and keep their identity
    assert!(after[1].ptr_eq(&before[0]));
    assert!(after[2].ptr_eq(&before[1]));
}

#[test]
fn test_evicted_node_loses_parent() {
    let file = NbtFile::new(sample_document());
    let doc = Rc::clone(file.document());
    let root = TreeNode::new_root(Backing::File(file), registry()).unwrap();
    let children = root.children().unwrap();
    let a_node = children[0].clone();
    assert!(a_node.parent().unwrap().ptr_eq(&root));

    let a_tag = a_node.backing().as_tag().unwrap().clone();
    remove_child(doc.root(), &a_tag).unwrap();
    assert!(root.refresh_children().unwrap());

    assert!(a_node.parent().is_none());
    assert_eq!(root.cached_children().len(), 1);
}

#[test]
fn test_descendant_count_after_full_expansion() {
    let file = NbtFile::new(sample_document());
    let root = TreeNode::new_root(Backing::File(file), registry()).unwrap();

    let visited = root.expand_all(&CancellationToken::new(), |_| {}).unwrap();

    // a, b, c, d, 3, 4 below the root
    assert_eq!(visited, 7);
    assert_eq!(root.descendant_count(), 6);
    let b = root.cached_children()[1].clone();
    assert_eq!(b.descendant_count(), 4);
}

#[test]
fn test_path_runs_from_root() {
    let file = NbtFile::new(sample_document());
    let root = TreeNode::new_root(Backing::File(file), registry()).unwrap();
    let b = root.children().unwrap()[1].clone();
    let d = b.children().unwrap()[1].clone();

    let path = d.path();
    assert_eq!(path.len(), 3);
    assert!(path.nodes()[0].ptr_eq(&root));
    assert!(path.last().unwrap().ptr_eq(&d));
    assert_eq!(path.parent().len(), 2);
}

// =============================================================================
// Record Nodes
// =============================================================================

#[test]
fn test_record_node_loads_on_children_access() {
    let temp = TempDir::new().unwrap();
    let store = RecordStore::open(&saved_region(&temp, &[(0, 0), (1, 0)])).unwrap();
    let root = TreeNode::new_root(Backing::Archive(Rc::clone(&store)), registry()).unwrap();

    let records = root.children().unwrap();
    assert_eq!(records.len(), 2);
    let record = store.record(0, 0).unwrap();
    assert_eq!(record.status(), RecordStatus::NotLoaded);
    assert_eq!(records[0].preview_value(), "(open to load)");
    assert_eq!(records[0].preview_name(), "Record [0, 0]");

    // expander check must not load
    assert!(records[0].has_children());
    assert_eq!(record.status(), RecordStatus::NotLoaded);

    let tags = records[0].children().unwrap();
    assert_eq!(record.status(), RecordStatus::Loaded);
    assert_eq!(tags.len(), 2);
    assert_eq!(store.record(1, 0).unwrap().status(), RecordStatus::NotLoaded);
}

#[test]
fn test_corrupt_record_node_has_no_children() {
    let temp = TempDir::new().unwrap();
    let path = saved_region(&temp, &[(0, 0), (3, 0)]);
    let mut bytes = std::fs::read(&path).unwrap();
    let table = tagtree::SectorTable::decode(&bytes).unwrap();
    let at = table.slot(3, 0).unwrap().byte_offset() as usize;
    for byte in &mut bytes[at + 5..at + 40] {
        *byte = 0x5A;
    }
    std::fs::write(&path, bytes).unwrap();

    let store = RecordStore::open(&path).unwrap();
    let root = TreeNode::new_root(Backing::Archive(store), registry()).unwrap();
    let corrupt = root.children().unwrap()[1].clone();

    assert!(corrupt.children().unwrap().is_empty());
    assert!(!corrupt.has_children());
    assert_eq!(corrupt.preview_value(), "(corrupt!)");
    assert_eq!(corrupt.icon(), Icon::CorruptRecord);
}

#[test]
fn test_archive_preview_counts_records() {
    let single = RecordStore::create_empty();
    single
        .add_record(LazyRecord::new(0, 0, Document::empty()).unwrap())
        .unwrap();
    let node = TreeNode::new_root(Backing::Archive(single), registry()).unwrap();

    assert_eq!(node.preview_value(), "[1 record]");
    assert_eq!(node.icon(), Icon::Archive);
}

// =============================================================================
// Registry
// =============================================================================

struct CountingTags {
    calls: Cell<usize>,
}

impl NodeKind for CountingTags {
    fn children(&self, backing: &Backing) -> Vec<Backing> {
        self.calls.set(self.calls.get() + 1);
        TagNodes.children(backing)
    }

    fn preview_name(&self, _backing: &Backing) -> String {
        "custom".to_string()
    }

    fn preview_value(&self, backing: &Backing) -> String {
        TagNodes.preview_value(backing)
    }

    fn icon(&self, backing: &Backing) -> Icon {
        TagNodes.icon(backing)
    }
}

#[test]
fn test_registry_override_replaces_behaviour() {
    let mut registry = NodeRegistry::with_defaults();
    let custom = Rc::new(CountingTags { calls: Cell::new(0) });
    let previous = registry.register(BackingKind::Tag, custom.clone());
    assert!(previous.is_some());

    let doc = sample_document();
    let root = TreeNode::new_root(Backing::Tag(Rc::clone(doc.root())), Rc::new(registry)).unwrap();

    assert_eq!(root.preview_name(), "custom");
    root.children().unwrap();
    assert_eq!(custom.calls.get(), 1);
}

#[test]
fn test_unregistered_kind_is_invalid_state() {
    let registry = Rc::new(NodeRegistry::new());
    let result = TreeNode::new_root(Backing::File(NbtFile::new(Document::empty())), registry);

    assert!(matches!(result, Err(TreeError::InvalidState(_))));
}

// =============================================================================
// Expansion
// =============================================================================

#[test]
fn test_pre_cancelled_walk_returns_cancelled() {
    let file = NbtFile::new(sample_document());
    let root = TreeNode::new_root(Backing::File(file), registry()).unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let mut seen = 0;
    let result = root.expand_all(&token, |_| seen += 1);

    assert!(matches!(result, Err(TreeError::Cancelled)));
    assert_eq!(seen, 0);
}

#[test]
fn test_walk_visits_pre_order_and_loads_records() {
    let temp = TempDir::new().unwrap();
    let store = RecordStore::open(&saved_region(&temp, &[(0, 0), (1, 0)])).unwrap();
    let root = TreeNode::new_root(Backing::Archive(Rc::clone(&store)), registry()).unwrap();

    let mut names = Vec::new();
    let visited = root
        .expand_all(&CancellationToken::new(), |node| names.push(node.preview_name()))
        .unwrap();

    // archive + 2 records × (record node + 6 tags)
    assert_eq!(visited, 15);
    assert_eq!(names[1], "Record [0, 0]");
    assert_eq!(names[2], "a");
    assert_eq!(names[8], "Record [1, 0]");
    assert!(store.records().iter().all(|r| r.is_loaded()));
    assert_eq!(root.descendant_count(), 14);
}
