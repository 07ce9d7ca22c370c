//! Session Module
//!
//! One editing session: the open roots, their tree model and the undo
//! history they share.
//!
//! ## Responsibilities
//! - Open paths as regions or standalone documents
//! - Route edits through the history, then notify the tree
//! - Resync the tree after undo and redo
//! - Save everything with unsaved changes

use std::path::Path;
use std::rc::Rc;

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, TreeError};
use crate::history::UndoHistory;
use crate::nbt::{default_formats, BincodeCodec, DocumentFormat, NbtFile, RecordCodec};
use crate::region::RecordStore;
use crate::tree::{Backing, TreeModel, TreeNode, Walker};

/// The editing context for a set of open archives and documents
pub struct Session {
    /// Session configuration
    config: Config,

    /// Payload codec for opened regions
    codec: Rc<dyn RecordCodec>,

    /// Strategies tried, in order, when opening a standalone document
    formats: Vec<Rc<dyn DocumentFormat>>,

    /// Roots and change notification
    model: TreeModel,

    /// Undo/redo for every edit made in this session
    history: UndoHistory,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            codec: Rc::new(BincodeCodec),
            formats: default_formats(),
            model: TreeModel::new(),
            history: UndoHistory::new(),
        }
    }

    /// Replace the strategies used for standalone documents
    pub fn with_formats(mut self, formats: Vec<Rc<dyn DocumentFormat>>) -> Self {
        self.formats = formats;
        self
    }

    /// Open `path` and add it as a root.
    ///
    /// Steps:
    /// 1. Try it as a region file
    /// 2. If it is not one, try each document format in order
    pub fn open_path(&self, path: &Path) -> Result<TreeNode> {
        // Step 1: Region
        match self.open_region(path) {
            Ok(node) => return Ok(node),
            Err(TreeError::Format(reason)) => {
                debug!(path = %path.display(), %reason, "not a region file, trying document formats");
            }
            Err(e) => return Err(e),
        }

        // Step 2: Standalone document
        self.open_file(path)
    }

    /// Open `path` as a region and add it as a root
    pub fn open_region(&self, path: &Path) -> Result<TreeNode> {
        let store = RecordStore::open_with(path, self.config.clone(), Rc::clone(&self.codec))?;
        self.model.add_root(Backing::Archive(store))
    }

    /// Open `path` as a standalone document and add it as a root
    pub fn open_file(&self, path: &Path) -> Result<TreeNode> {
        let file = NbtFile::try_open_with(path, &self.formats)?;
        info!(path = %path.display(), "opened document");
        self.model.add_root(Backing::File(file))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn model(&self) -> &TreeModel {
        &self.model
    }

    pub fn history(&self) -> &UndoHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut UndoHistory {
        &mut self.history
    }

    /// A walker honouring this session's poll interval
    pub fn walker(&self) -> Walker {
        Walker::new(&self.config)
    }

    /// Run an edit against the history, then notify the tree that `changed`
    /// (usually the container or archive edited) needs resyncing
    pub fn edit<T, F>(&mut self, changed: &Backing, edit: F) -> Result<T>
    where
        F: FnOnce(&mut UndoHistory) -> Result<T>,
    {
        let output = edit(&mut self.history)?;
        self.model.notify(changed)?;
        Ok(output)
    }

    /// Undo up to `count` actions and resync expanded nodes
    pub fn undo(&mut self, count: usize) -> Result<usize> {
        let undone = self.history.undo(count)?;
        self.model.refresh()?;
        Ok(undone)
    }

    /// Redo up to `count` actions and resync expanded nodes
    pub fn redo(&mut self, count: usize) -> Result<usize> {
        let redone = self.history.redo(count)?;
        self.model.refresh()?;
        Ok(redone)
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.model.has_unsaved_changes()
    }

    /// Save every root archive and file that has a path and unsaved changes.
    /// Returns how many were written.
    pub fn save_all(&self) -> Result<usize> {
        let mut saved = 0;
        for root in self.model.roots() {
            match root.backing() {
                Backing::Archive(store) if store.can_save() && store.has_unsaved_changes() => {
                    store.save()?;
                    saved += 1;
                }
                Backing::File(file) if file.can_save() && file.has_unsaved_changes() => {
                    file.save()?;
                    saved += 1;
                }
                _ => {}
            }
        }
        if saved > 0 {
            self.model.notify_structure(None);
        }
        Ok(saved)
    }
}
