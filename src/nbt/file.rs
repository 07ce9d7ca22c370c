//! File-backed documents
//!
//! An [`NbtFile`] pairs a [`Document`] with the path and [`DocumentFormat`]
//! it was read with, so saving writes it back the same way.
//!
//! ## Opening
//! [`NbtFile::try_open`] tries each format in priority order:
//! 1. the first attempt that succeeds and does not look suspicious wins
//! 2. if every success looked suspicious, the first success wins
//! 3. if everything failed, the first error is returned

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use crate::error::{Result, TreeError};

use super::codec::{BincodeCodec, Compression};
use super::document::{Document, DocumentHandle};

/// Shared handle to a file-backed document
pub type FileHandle = Rc<NbtFile>;

/// A way of reading and writing a whole document file
pub trait DocumentFormat {
    /// Short label used in logs
    fn name(&self) -> &str;

    fn read(&self, bytes: &[u8]) -> Result<DocumentHandle>;

    fn write(&self, document: &Document) -> Result<Vec<u8>>;
}

/// Bincode tag tree, optionally wrapped in gzip or zlib
#[derive(Debug, Clone, Copy)]
pub struct BincodeFormat {
    /// `None` on read means auto-detect
    pub compression: Option<Compression>,
}

impl BincodeFormat {
    pub fn raw() -> Self {
        Self {
            compression: Some(Compression::None),
        }
    }

    pub fn auto_detect() -> Self {
        Self { compression: None }
    }
}

impl DocumentFormat for BincodeFormat {
    fn name(&self) -> &str {
        match self.compression {
            Some(Compression::None) => "bincode",
            Some(Compression::Gzip) => "bincode+gzip",
            Some(Compression::Zlib) => "bincode+zlib",
            None => "bincode+auto",
        }
    }

    fn read(&self, bytes: &[u8]) -> Result<DocumentHandle> {
        let compression = self
            .compression
            .unwrap_or_else(|| Compression::detect(bytes));
        let raw = compression.decompress(bytes)?;
        BincodeCodec::deserialize(&raw).map_err(|e| TreeError::Format(e.to_string()))
    }

    fn write(&self, document: &Document) -> Result<Vec<u8>> {
        let raw = BincodeCodec::serialize(document)?;
        self.compression.unwrap_or(Compression::Gzip).compress(&raw)
    }
}

/// Built-in formats in the order `try_open` attempts them
pub fn default_formats() -> Vec<Rc<dyn DocumentFormat>> {
    vec![
        Rc::new(BincodeFormat::raw()),
        Rc::new(BincodeFormat::auto_detect()),
    ]
}

/// Run attempts in order and pick a result by the rules in the module docs
pub fn pick_first_plausible<T, F>(
    attempts: impl IntoIterator<Item = F>,
    suspicious: impl Fn(&T) -> bool,
) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let mut tried = Vec::new();
    for attempt in attempts {
        match attempt() {
            Ok(value) if !suspicious(&value) => return Ok(value),
            other => tried.push(other),
        }
    }

    let mut first_error = None;
    for result in tried {
        match result {
            Ok(value) => return Ok(value),
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }
    Err(first_error.unwrap_or_else(|| {
        TreeError::Format("no decode strategies were attempted".to_string())
    }))
}

/// A document loaded from (or destined for) a single file
pub struct NbtFile {
    path: RefCell<Option<PathBuf>>,
    document: DocumentHandle,
    format: RefCell<Option<Rc<dyn DocumentFormat>>>,
}

impl NbtFile {
    /// Wrap an in-memory document that has never been saved
    pub fn new(document: DocumentHandle) -> FileHandle {
        document.mark_dirty();
        Rc::new(Self {
            path: RefCell::new(None),
            document,
            format: RefCell::new(None),
        })
    }

    /// Open `path` trying the built-in formats
    pub fn try_open(path: &Path) -> Result<FileHandle> {
        Self::try_open_with(path, &default_formats())
    }

    /// Open `path` trying `formats` in order
    pub fn try_open_with(path: &Path, formats: &[Rc<dyn DocumentFormat>]) -> Result<FileHandle> {
        let bytes = fs::read(path)?;
        let attempts = formats.iter().map(|format| {
            let bytes = &bytes;
            move || -> Result<(DocumentHandle, Rc<dyn DocumentFormat>)> {
                let document = format.read(bytes)?;
                debug!(format = format.name(), "decoded {}", path.display());
                Ok((document, Rc::clone(format)))
            }
        });
        let (document, format) =
            pick_first_plausible(attempts, |(doc, _): &(DocumentHandle, Rc<dyn DocumentFormat>)| {
                doc.root().borrow().looks_suspicious()
            })?;

        Ok(Rc::new(Self {
            path: RefCell::new(Some(path.to_path_buf())),
            document,
            format: RefCell::new(Some(format)),
        }))
    }

    pub fn document(&self) -> &DocumentHandle {
        &self.document
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.path.borrow().clone()
    }

    /// Display name: the file name, or a placeholder for unsaved files
    pub fn display_name(&self) -> String {
        self.path
            .borrow()
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "(unsaved file)".to_string())
    }

    pub fn can_save(&self) -> bool {
        self.path.borrow().is_some() && self.format.borrow().is_some()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.document.is_dirty()
    }

    /// Write the document back to its path with its format
    pub fn save(&self) -> Result<()> {
        let path = self.path().ok_or_else(|| {
            TreeError::InvalidState("file has no path to save to".to_string())
        })?;
        let format = self.format.borrow().clone().ok_or_else(|| {
            TreeError::InvalidState("file has no export format".to_string())
        })?;
        let bytes = format.write(&self.document)?;
        fs::write(&path, bytes)?;
        self.document.mark_clean();
        debug!(format = format.name(), "saved {}", path.display());
        Ok(())
    }

    /// Save to a new path, optionally switching format
    pub fn save_as(&self, path: &Path, format: Option<Rc<dyn DocumentFormat>>) -> Result<()> {
        if let Some(format) = format {
            *self.format.borrow_mut() = Some(format);
        } else if self.format.borrow().is_none() {
            *self.format.borrow_mut() = Some(Rc::new(BincodeFormat {
                compression: Some(Compression::Gzip),
            }));
        }
        *self.path.borrow_mut() = Some(path.to_path_buf());
        self.save()
    }

    /// Rename the backing file on disk
    pub fn move_to(&self, path: &Path) -> Result<()> {
        if let Some(current) = self.path() {
            fs::rename(&current, path)?;
            *self.path.borrow_mut() = Some(path.to_path_buf());
        }
        Ok(())
    }
}
