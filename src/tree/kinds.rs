//! Built-in node kinds
//!
//! Default behaviour for archives, records, files and tags. Files and
//! records present their document's root compound directly: their children
//! are the root's children.

use crate::nbt::{TagHandle, TagKind};
use crate::region::RecordStatus;

use super::backing::Backing;
use super::registry::NodeKind;

/// Icon shown next to a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Icon {
    Archive,
    Record,
    CorruptRecord,
    ExternalRecord,
    File,
    Tag(TagKind),
}

fn tag_backings(tags: Vec<TagHandle>) -> Vec<Backing> {
    tags.into_iter().map(Backing::Tag).collect()
}

/// Records of a region, row-major
pub struct ArchiveNodes;

impl NodeKind for ArchiveNodes {
    fn children(&self, backing: &Backing) -> Vec<Backing> {
        match backing.as_archive() {
            Some(store) => store.records().into_iter().map(Backing::Record).collect(),
            None => Vec::new(),
        }
    }

    fn has_children(&self, backing: &Backing) -> bool {
        backing.as_archive().map_or(false, |store| !store.is_empty())
    }

    fn preview_name(&self, backing: &Backing) -> String {
        backing
            .as_archive()
            .map(|store| store.display_name())
            .unwrap_or_default()
    }

    fn preview_value(&self, backing: &Backing) -> String {
        match backing.as_archive() {
            Some(store) => match store.record_count() {
                1 => "[1 record]".to_string(),
                n => format!("[{} records]", n),
            },
            None => String::new(),
        }
    }

    fn icon(&self, _backing: &Backing) -> Icon {
        Icon::Archive
    }
}

/// A record's root compound; asking for children loads the record
pub struct RecordNodes;

impl NodeKind for RecordNodes {
    fn children(&self, backing: &Backing) -> Vec<Backing> {
        let record = match backing.as_record() {
            Some(record) => record,
            None => return Vec::new(),
        };
        if record.is_external() {
            return Vec::new();
        }
        record.load();
        match record.document() {
            Some(doc) => tag_backings(doc.root().borrow().children()),
            None => Vec::new(),
        }
    }

    fn has_children(&self, backing: &Backing) -> bool {
        let record = match backing.as_record() {
            Some(record) => record,
            None => return false,
        };
        match record.status() {
            RecordStatus::External | RecordStatus::Corrupt => false,
            RecordStatus::NotLoaded => true,
            RecordStatus::Loaded => record
                .document()
                .map_or(false, |doc| doc.root().borrow().child_count() > 0),
        }
    }

    fn preview_name(&self, backing: &Backing) -> String {
        match backing.as_record() {
            Some(record) => format!("Record [{}, {}]", record.x(), record.z()),
            None => String::new(),
        }
    }

    fn preview_value(&self, backing: &Backing) -> String {
        let record = match backing.as_record() {
            Some(record) => record,
            None => return String::new(),
        };
        match record.status() {
            RecordStatus::Loaded => record
                .document()
                .map(|doc| doc.root().borrow().preview_value())
                .unwrap_or_default(),
            RecordStatus::NotLoaded => "(open to load)".to_string(),
            RecordStatus::Corrupt => "(corrupt!)".to_string(),
            RecordStatus::External => "(saved externally)".to_string(),
        }
    }

    fn icon(&self, backing: &Backing) -> Icon {
        match backing.as_record().map(|r| r.status()) {
            Some(RecordStatus::Corrupt) => Icon::CorruptRecord,
            Some(RecordStatus::External) => Icon::ExternalRecord,
            _ => Icon::Record,
        }
    }
}

/// A standalone document file
pub struct FileNodes;

impl NodeKind for FileNodes {
    fn children(&self, backing: &Backing) -> Vec<Backing> {
        match backing.as_file() {
            Some(file) => tag_backings(file.document().root().borrow().children()),
            None => Vec::new(),
        }
    }

    fn has_children(&self, backing: &Backing) -> bool {
        backing
            .as_file()
            .map_or(false, |file| file.document().root().borrow().child_count() > 0)
    }

    fn preview_name(&self, backing: &Backing) -> String {
        backing
            .as_file()
            .map(|file| file.display_name())
            .unwrap_or_default()
    }

    fn preview_value(&self, backing: &Backing) -> String {
        backing
            .as_file()
            .map(|file| file.document().root().borrow().preview_value())
            .unwrap_or_default()
    }

    fn icon(&self, _backing: &Backing) -> Icon {
        Icon::File
    }
}

/// Any tag; only lists and compounds have children
pub struct TagNodes;

impl NodeKind for TagNodes {
    fn children(&self, backing: &Backing) -> Vec<Backing> {
        match backing.as_tag() {
            Some(tag) => tag_backings(tag.borrow().children()),
            None => Vec::new(),
        }
    }

    fn has_children(&self, backing: &Backing) -> bool {
        backing
            .as_tag()
            .map_or(false, |tag| tag.borrow().child_count() > 0)
    }

    fn preview_name(&self, backing: &Backing) -> String {
        backing
            .as_tag()
            .and_then(|tag| tag.borrow().name.clone())
            .unwrap_or_default()
    }

    fn preview_value(&self, backing: &Backing) -> String {
        backing
            .as_tag()
            .map(|tag| tag.borrow().preview_value())
            .unwrap_or_default()
    }

    fn icon(&self, backing: &Backing) -> Icon {
        match backing.as_tag() {
            Some(tag) => Icon::Tag(tag.borrow().kind()),
            None => Icon::Tag(TagKind::Compound),
        }
    }
}
