//! Tests for TreeModel and its change bus
//!
//! These tests verify:
//! - Adding roots emits Changed then NodesAdded under the top level
//! - notify reconciles one node and emits row-level differences
//! - notify for objects without a node is a silent no-op
//! - Removal of roots and inner nodes
//! - Document root tags resolve to the node presenting them

use std::rc::Rc;
use std::sync::mpsc::Receiver;

use tagtree::nbt::tag::{insert_child, remove_child};
use tagtree::tree::{ChangeBus, TreePath};
use tagtree::{
    Backing, ChangeEvent, Document, LazyRecord, NbtFile, NbtTag, RecordStore, TagValue, TreeModel,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn drain(events: &Receiver<ChangeEvent>) -> Vec<ChangeEvent> {
    events.try_iter().collect()
}

fn two_tag_file() -> tagtree::nbt::FileHandle {
    let doc = Document::empty();
    insert_child(doc.root(), 0, NbtTag::named("a", TagValue::Int(1))).unwrap();
    insert_child(doc.root(), 1, NbtTag::named("b", TagValue::Int(2))).unwrap();
    NbtFile::new(doc)
}

// =============================================================================
// Roots
// =============================================================================

#[test]
fn test_add_root_emits_changed_then_added() {
    let model = TreeModel::new();
    let events = model.subscribe();

    let first = model.add_root(Backing::File(two_tag_file())).unwrap();
    let second = model.add_root(Backing::File(two_tag_file())).unwrap();

    assert!(first.is_expanded());
    assert!(!second.is_expanded());
    assert_eq!(model.roots().len(), 2);

    let events = drain(&events);
    assert_eq!(events.len(), 4);
    assert!(matches!(events[0], ChangeEvent::Changed));
    match &events[3] {
        ChangeEvent::NodesAdded {
            parent,
            indices,
            nodes,
        } => {
            assert!(parent.is_empty());
            assert_eq!(indices, &vec![1]);
            assert!(nodes[0].ptr_eq(&second));
        }
        other => panic!("expected NodesAdded, got {:?}", other),
    }
}

#[test]
fn test_remove_root_emits_removed_under_top_level() {
    let model = TreeModel::new();
    let file = two_tag_file();
    let backing = Backing::File(file);
    model.add_root(backing.clone()).unwrap();
    let events = model.subscribe();

    assert!(model.remove_root(&backing));
    assert!(model.roots().is_empty());
    assert!(!model.remove_root(&backing));

    let events = drain(&events);
    assert_eq!(events.len(), 2);
    match &events[0] {
        ChangeEvent::NodesRemoved { parent, nodes } => {
            assert_eq!(parent, &TreePath::empty());
            assert_eq!(nodes.len(), 1);
        }
        other => panic!("expected NodesRemoved, got {:?}", other),
    }
    assert!(matches!(events[1], ChangeEvent::Changed));
}

// =============================================================================
// Notify
// =============================================================================

#[test]
fn test_notify_emits_added_rows() {
    let model = TreeModel::new();
    let file = two_tag_file();
    let root = model.add_root(Backing::File(Rc::clone(&file))).unwrap();
    root.children().unwrap();
    let events = model.subscribe();

    let c = NbtTag::named("c", TagValue::Int(3));
    insert_child(file.document().root(), 1, Rc::clone(&c)).unwrap();
    assert!(model.notify(&Backing::File(Rc::clone(&file))).unwrap());

    let events = drain(&events);
    assert_eq!(events.len(), 3);
    assert!(matches!(events[0], ChangeEvent::Changed));
    match &events[1] {
        ChangeEvent::NodesChanged { parent, node } => {
            assert!(parent.is_empty());
            assert!(node.ptr_eq(&root));
        }
        other => panic!("expected NodesChanged, got {:?}", other),
    }
    match &events[2] {
        ChangeEvent::NodesAdded {
            parent,
            indices,
            nodes,
        } => {
            assert_eq!(parent.len(), 1);
            assert_eq!(indices, &vec![1]);
            assert_eq!(nodes[0].backing(), &Backing::Tag(c));
        }
        other => panic!("expected NodesAdded, got {:?}", other),
    }
    assert_eq!(root.descendant_count(), 3);
}

#[test]
fn test_notify_emits_removed_rows() {
    let model = TreeModel::new();
    let file = two_tag_file();
    let root = model.add_root(Backing::File(Rc::clone(&file))).unwrap();
    let a_node = root.children().unwrap()[0].clone();
    let events = model.subscribe();

    let a = file.document().root().borrow().get("a").unwrap();
    remove_child(file.document().root(), &a).unwrap();
    model.notify(&Backing::File(file)).unwrap();

    let events = drain(&events);
    let removed = events.iter().find_map(|event| match event {
        ChangeEvent::NodesRemoved { nodes, .. } => Some(nodes.clone()),
        _ => None,
    });
    let removed = removed.expect("a NodesRemoved event");
    assert!(removed[0].ptr_eq(&a_node));
    assert!(a_node.parent().is_none());
}

#[test]
fn test_notify_by_document_root_tag_finds_file_node() {
    let model = TreeModel::new();
    let file = two_tag_file();
    let root = model.add_root(Backing::File(Rc::clone(&file))).unwrap();

    let root_tag = Backing::Tag(Rc::clone(file.document().root()));
    let found = model.find_node(&root_tag).unwrap();

    assert!(found.ptr_eq(&root));
    assert!(model.notify(&root_tag).unwrap());
}

#[test]
fn test_notify_without_materialized_node_does_nothing() {
    let model = TreeModel::new();
    let file = two_tag_file();
    model.add_root(Backing::File(Rc::clone(&file))).unwrap();
    let events = model.subscribe();

    // children were never reconciled, so "a" has no node yet
    let a = file.document().root().borrow().get("a").unwrap();
    let notified = model.notify(&Backing::Tag(a)).unwrap();

    assert!(!notified);
    assert!(drain(&events).is_empty());
}

#[test]
fn test_notify_on_archive_after_adding_record() {
    let model = TreeModel::new();
    let store = RecordStore::create_empty();
    let root = model.add_root(Backing::Archive(Rc::clone(&store))).unwrap();
    assert!(root.children().unwrap().is_empty());

    store
        .add_record(LazyRecord::new(2, 0, Document::empty()).unwrap())
        .unwrap();
    model.notify(&Backing::Archive(store)).unwrap();

    let children = root.cached_children();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].preview_name(), "Record [2, 0]");
    assert!(model.has_unsaved_changes());
}

// =============================================================================
// Removal and Structure
// =============================================================================

#[test]
fn test_remove_inner_node_reports_parent_path() {
    let model = TreeModel::new();
    let file = two_tag_file();
    let root = model.add_root(Backing::File(Rc::clone(&file))).unwrap();
    let b_node = root.children().unwrap()[1].clone();
    let events = model.subscribe();

    assert!(model.remove(b_node.backing()));

    match &drain(&events)[0] {
        ChangeEvent::NodesRemoved { parent, nodes } => {
            assert!(parent.last().unwrap().ptr_eq(&root));
            assert!(nodes[0].ptr_eq(&b_node));
        }
        other => panic!("expected NodesRemoved, got {:?}", other),
    }
    // not a root, so the root list is untouched
    assert_eq!(model.roots().len(), 1);
}

#[test]
fn test_notify_structure_defaults_to_whole_tree() {
    let model = TreeModel::new();
    model.add_root(Backing::File(two_tag_file())).unwrap();
    let events = model.subscribe();

    model.notify_structure(None);

    match &drain(&events)[0] {
        ChangeEvent::StructureChanged { path } => assert!(path.is_empty()),
        other => panic!("expected StructureChanged, got {:?}", other),
    }
}

#[test]
fn test_bus_drops_hung_up_subscribers() {
    let bus = ChangeBus::new();
    let kept = bus.subscribe();
    let dropped = bus.subscribe();
    drop(dropped);

    bus.emit(ChangeEvent::Changed);

    assert_eq!(bus.subscriber_count(), 1);
    assert_eq!(drain(&kept).len(), 1);
}
