//! Undoable edits
//!
//! Every structural change a user can make, expressed as an
//! [`UndoableAction`] that is run and recorded in one step. Tag edits mark
//! their document dirty in both directions; record edits flag the archive.
//!
//! None of these notify a tree. Callers follow up with
//! `TreeModel::notify` (or `Session` does it for them).

use std::rc::Rc;

use crate::error::{Result, TreeError};
use crate::history::{UndoHistory, UndoableAction};
use crate::nbt::tag::{insert_child, remove_child};
use crate::nbt::{DocumentHandle, NbtTag, TagHandle, TagKind, TagValue};
use crate::region::{RecordHandle, StoreHandle};

fn describe(tag: &TagHandle) -> String {
    let tag = tag.borrow();
    match tag.name() {
        Some(name) if !name.is_empty() => format!("'{}'", name),
        _ => format!("{} tag", tag.kind().display_name().to_lowercase()),
    }
}

fn describe_record(record: &RecordHandle) -> String {
    let (x, z) = record.coords();
    match record.owner() {
        Some(store) => format!("record at ({}, {}) in '{}'", x, z, store.display_name()),
        None => format!("record at ({}, {})", x, z),
    }
}

fn require_attached(doc: &DocumentHandle, tag: &TagHandle) -> Result<()> {
    if doc.contains(tag) {
        Ok(())
    } else {
        Err(TreeError::InvalidState(format!(
            "{} is not part of this document",
            describe(tag)
        )))
    }
}

/// Element kind of a list, `None` for non-lists
fn list_kind(tag: &TagHandle) -> Option<Option<TagKind>> {
    match &tag.borrow().value {
        TagValue::List { kind, .. } => Some(*kind),
        _ => None,
    }
}

fn restore_list_kind(tag: &TagHandle, saved: Option<Option<TagKind>>) {
    if let (Some(saved), TagValue::List { kind, .. }) = (saved, &mut tag.borrow_mut().value) {
        *kind = saved;
    }
}

/// Move `tag` from `from` to `to`, putting it back at `back` if the insert fails
fn relocate(from: &TagHandle, to: &TagHandle, at: usize, back: usize, tag: &TagHandle) -> Result<()> {
    let original = remove_child(from, tag).unwrap_or(back);
    if let Err(e) = insert_child(to, at, Rc::clone(tag)) {
        insert_child(from, original, Rc::clone(tag))?;
        return Err(e);
    }
    Ok(())
}

// =============================================================================
// Tag Edits
// =============================================================================

/// Insert `tag` into `container` at `index` (end when `None`)
pub fn add_tag(
    history: &mut UndoHistory,
    doc: &DocumentHandle,
    container: &TagHandle,
    index: Option<usize>,
    tag: TagHandle,
) -> Result<()> {
    require_attached(doc, container)?;
    if doc.contains(&tag) {
        return Err(TreeError::InvalidState(format!(
            "{} already has a parent, move it instead",
            describe(&tag)
        )));
    }
    let at = index.unwrap_or_else(|| container.borrow().child_count());
    let saved_kind = list_kind(container);

    let (d1, c1, t1) = (Rc::clone(doc), Rc::clone(container), Rc::clone(&tag));
    let (d2, c2, t2) = (Rc::clone(doc), Rc::clone(container), Rc::clone(&tag));
    let action = UndoableAction::new(
        format!("Add {}", describe(&tag)),
        move || {
            insert_child(&c1, at, Rc::clone(&t1))?;
            d1.mark_dirty();
            Ok(())
        },
        move || {
            remove_child(&c2, &t2);
            restore_list_kind(&c2, saved_kind);
            d2.mark_dirty();
            Ok(())
        },
    );
    history.perform(action)
}

/// Take `tag` out of its container
pub fn remove_tag(history: &mut UndoHistory, doc: &DocumentHandle, tag: &TagHandle) -> Result<()> {
    let parent = doc.parent_of(tag).ok_or_else(|| {
        TreeError::InvalidState(format!("{} is not attached to a parent", describe(tag)))
    })?;
    let index = parent.borrow().index_of(tag).unwrap_or(0);

    let (d1, p1, t1) = (Rc::clone(doc), Rc::clone(&parent), Rc::clone(tag));
    let (d2, p2, t2) = (Rc::clone(doc), parent, Rc::clone(tag));
    let action = UndoableAction::new(
        format!("Remove {}", describe(tag)),
        move || {
            remove_child(&p1, &t1);
            d1.mark_dirty();
            Ok(())
        },
        move || {
            insert_child(&p2, index, Rc::clone(&t2))?;
            d2.mark_dirty();
            Ok(())
        },
    );
    history.perform(action)
}

/// Rename `tag`; the document root may be renamed freely
pub fn rename_tag(
    history: &mut UndoHistory,
    doc: &DocumentHandle,
    tag: &TagHandle,
    name: Option<String>,
) -> Result<()> {
    let is_root = Rc::ptr_eq(doc.root(), tag);
    if !is_root {
        let parent = doc.parent_of(tag).ok_or_else(|| {
            TreeError::InvalidState(format!("{} is not attached to a parent", describe(tag)))
        })?;
        let renamed = NbtTag {
            name: name.clone(),
            value: TagValue::Byte(0),
        };
        let in_compound = matches!(parent.borrow().value, TagValue::Compound(_));
        if in_compound {
            parent.borrow().check_insertable(&renamed, tag)?;
        } else if name.is_some() {
            return Err(TreeError::InvalidState(
                "list items must be unnamed".to_string(),
            ));
        }
    }

    let old = tag.borrow().name.clone();
    let description = format!(
        "Rename {} to '{}'",
        describe(tag),
        name.as_deref().unwrap_or_default()
    );
    let (d1, t1, new1) = (Rc::clone(doc), Rc::clone(tag), name);
    let (d2, t2) = (Rc::clone(doc), Rc::clone(tag));
    let action = UndoableAction::new(
        description,
        move || {
            t1.borrow_mut().name = new1.clone();
            d1.mark_dirty();
            Ok(())
        },
        move || {
            t2.borrow_mut().name = old.clone();
            d2.mark_dirty();
            Ok(())
        },
    );
    history.perform(action)
}

/// Replace the value of a non-container tag
pub fn set_value(
    history: &mut UndoHistory,
    doc: &DocumentHandle,
    tag: &TagHandle,
    value: TagValue,
) -> Result<()> {
    require_attached(doc, tag)?;
    let old = tag.borrow().value.clone();
    if old.kind().is_container() || value.kind().is_container() {
        return Err(TreeError::InvalidState(
            "container values are edited through their children".to_string(),
        ));
    }
    if let Some(parent) = doc.parent_of(tag) {
        if let Some(Some(kind)) = list_kind(&parent) {
            if kind != value.kind() {
                return Err(TreeError::InvalidState(format!(
                    "cannot put {} into a list of {}",
                    value.kind().display_name(),
                    kind.display_name()
                )));
            }
        }
    }

    let (d1, t1) = (Rc::clone(doc), Rc::clone(tag));
    let (d2, t2) = (Rc::clone(doc), Rc::clone(tag));
    let action = UndoableAction::new(
        format!("Edit value of {}", describe(tag)),
        move || {
            t1.borrow_mut().value = value.clone();
            d1.mark_dirty();
            Ok(())
        },
        move || {
            t2.borrow_mut().value = old.clone();
            d2.mark_dirty();
            Ok(())
        },
    );
    history.perform(action)
}

/// Move `tag` into `destination` at `index`.
///
/// `index` is a position in `destination` after `tag` has been taken out
/// of its current container. On failure the tag stays where it was.
pub fn move_tag(
    history: &mut UndoHistory,
    doc: &DocumentHandle,
    tag: &TagHandle,
    destination: &TagHandle,
    index: usize,
) -> Result<()> {
    require_attached(doc, destination)?;
    let source = doc.parent_of(tag).ok_or_else(|| {
        TreeError::InvalidState(format!("{} is not attached to a parent", describe(tag)))
    })?;
    let source_index = source.borrow().index_of(tag).unwrap_or(0);
    let saved_kind = list_kind(destination);

    let (d1, s1, to1, t1) = (Rc::clone(doc), Rc::clone(&source), Rc::clone(destination), Rc::clone(tag));
    let (d2, s2, to2, t2) = (Rc::clone(doc), source, Rc::clone(destination), Rc::clone(tag));
    let action = UndoableAction::new(
        format!("Move {}", describe(tag)),
        move || {
            relocate(&s1, &to1, index, source_index, &t1)?;
            d1.mark_dirty();
            Ok(())
        },
        move || {
            relocate(&to2, &s2, source_index, index, &t2)?;
            restore_list_kind(&to2, saved_kind);
            d2.mark_dirty();
            Ok(())
        },
    );
    history.perform(action)
}

// =============================================================================
// Record Edits
// =============================================================================

/// Place `record` into `store`, taking it from its current archive if any.
///
/// Undo puts it back where it came from.
pub fn add_record(history: &mut UndoHistory, store: &StoreHandle, record: &RecordHandle) -> Result<()> {
    let previous = record
        .owner()
        .filter(|owner| !Rc::ptr_eq(owner, store));
    let (x, z) = record.coords();

    let (s1, r1) = (Rc::clone(store), Rc::clone(record));
    let s2 = Rc::clone(store);
    let r2 = Rc::clone(record);
    let action = UndoableAction::new(
        format!("Add {}", describe_record(record)),
        move || s1.add_record(Rc::clone(&r1)),
        move || {
            s2.remove_record(x, z)?;
            if let Some(previous) = &previous {
                previous.add_record(Rc::clone(&r2))?;
            }
            Ok(())
        },
    );
    history.perform(action)
}

/// Take the record at `(x, z)` out of `store`; `None` if the slot is empty
pub fn remove_record(
    history: &mut UndoHistory,
    store: &StoreHandle,
    x: usize,
    z: usize,
) -> Result<Option<RecordHandle>> {
    let record = match store.record(x, z) {
        Some(record) => record,
        None => return Ok(None),
    };

    let s1 = Rc::clone(store);
    let (s2, r2) = (Rc::clone(store), Rc::clone(&record));
    let action = UndoableAction::new(
        format!("Remove {}", describe_record(&record)),
        move || s1.remove_record(x, z).map(|_| ()),
        move || s2.add_record(Rc::clone(&r2)),
    );
    history.perform(action)?;
    Ok(Some(record))
}
