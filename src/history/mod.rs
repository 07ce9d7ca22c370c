//! Undo History
//!
//! Linear undo/redo over [`UndoableAction`]s, one instance per session.
//!
//! ## Stacks
//! ```text
//!   record ──▶ [undo stack] ──undo──▶ [redo stack]
//!                   ▲                      │
//!                   └────────redo──────────┘
//!   pushing a new entry clears the redo stack
//! ```
//!
//! ## Batches
//! `begin_batch` / `end_batch` nest by counting. Actions recorded inside a
//! batch are buffered and only reach the undo stack when the outermost batch
//! closes, as a single entry.

mod action;

use std::sync::mpsc::{channel, Receiver, Sender};

use tracing::debug;

use crate::error::Result;

pub use action::{ActionFn, UndoableAction};

/// Stack change, sent to subscribers after it happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEvent {
    Recorded { description: String },
    Undone { description: String },
    Redone { description: String },
    BatchMerged { description: String, actions: usize },
}

/// Undo and redo stacks plus the open batch
#[derive(Default)]
pub struct UndoHistory {
    undo_stack: Vec<UndoableAction>,
    redo_stack: Vec<UndoableAction>,
    batch_depth: usize,
    batch: Vec<UndoableAction>,
    subscribers: Vec<Sender<HistoryEvent>>,
}

impl UndoHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every stack change from now on
    pub fn subscribe(&mut self) -> Receiver<HistoryEvent> {
        let (sender, receiver) = channel();
        self.subscribers.push(sender);
        receiver
    }

    fn emit(&mut self, event: HistoryEvent) {
        self.subscribers
            .retain(|sender| sender.send(event.clone()).is_ok());
    }

    /// Record an action whose forward step has already run
    pub fn record(&mut self, action: UndoableAction) {
        if self.batch_depth > 0 {
            debug!(
                description = action.description(),
                buffered = self.batch.len() + 1,
                "added action to batch"
            );
            self.batch.push(action);
            return;
        }
        let description = action.description().to_string();
        self.push(action);
        debug!(
            description = description.as_str(),
            undo = self.undo_stack.len(),
            "added action to stack"
        );
        self.emit(HistoryEvent::Recorded { description });
    }

    /// Run `action` forward, then record it
    pub fn perform(&mut self, action: UndoableAction) -> Result<()> {
        action.apply()?;
        self.record(action);
        Ok(())
    }

    fn push(&mut self, action: UndoableAction) {
        self.undo_stack.push(action);
        self.redo_stack.clear();
    }

    /// Undo up to `count` actions, stopping early when the stack runs out.
    ///
    /// Returns how many were undone. If an inverse fails, that action stays
    /// on the undo stack and the error is returned.
    pub fn undo(&mut self, count: usize) -> Result<usize> {
        let mut done = 0;
        while done < count {
            let action = match self.undo_stack.pop() {
                Some(action) => action,
                None => break,
            };
            if let Err(e) = action.revert() {
                self.undo_stack.push(action);
                return Err(e);
            }
            let description = action.description().to_string();
            self.redo_stack.push(action);
            debug!(
                description = description.as_str(),
                undo = self.undo_stack.len(),
                redo = self.redo_stack.len(),
                "performed undo"
            );
            self.emit(HistoryEvent::Undone { description });
            done += 1;
        }
        Ok(done)
    }

    /// Redo up to `count` actions, stopping early when the stack runs out
    pub fn redo(&mut self, count: usize) -> Result<usize> {
        let mut done = 0;
        while done < count {
            let action = match self.redo_stack.pop() {
                Some(action) => action,
                None => break,
            };
            if let Err(e) = action.apply() {
                self.redo_stack.push(action);
                return Err(e);
            }
            let description = action.description().to_string();
            self.undo_stack.push(action);
            debug!(
                description = description.as_str(),
                undo = self.undo_stack.len(),
                redo = self.redo_stack.len(),
                "performed redo"
            );
            self.emit(HistoryEvent::Redone { description });
            done += 1;
        }
        Ok(done)
    }

    /// Open a (possibly nested) batch
    pub fn begin_batch(&mut self) {
        self.batch_depth += 1;
    }

    /// Close a batch. Only the outermost close pushes anything:
    /// - nothing buffered: no entry
    /// - one action and `!force_group`: that action, with its own description
    /// - otherwise: one composite named `description`
    pub fn end_batch(&mut self, description: &str, force_group: bool) {
        if self.batch_depth == 0 {
            return;
        }
        self.batch_depth -= 1;
        if self.batch_depth > 0 || self.batch.is_empty() {
            return;
        }

        let mut actions = std::mem::take(&mut self.batch);
        let count = actions.len();
        let merged = match actions.pop() {
            Some(only) if actions.is_empty() && !force_group => only,
            Some(last) => {
                actions.push(last);
                UndoableAction::merge(description, actions)
            }
            None => return,
        };

        let description = merged.description().to_string();
        self.push(merged);
        debug!(
            description = description.as_str(),
            actions = count,
            undo = self.undo_stack.len(),
            "merged batch onto stack"
        );
        self.emit(HistoryEvent::BatchMerged {
            description,
            actions: count,
        });
    }

    pub fn is_batching(&self) -> bool {
        self.batch_depth > 0
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// `(n, description)` pairs, most recent first, `n` counting from 1
    pub fn undo_descriptions(&self) -> Vec<(usize, String)> {
        describe(&self.undo_stack)
    }

    /// `(n, description)` pairs, next redo first, `n` counting from 1
    pub fn redo_descriptions(&self) -> Vec<(usize, String)> {
        describe(&self.redo_stack)
    }

    /// Drop both stacks and any open batch
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.batch.clear();
        self.batch_depth = 0;
    }
}

fn describe(stack: &[UndoableAction]) -> Vec<(usize, String)> {
    stack
        .iter()
        .rev()
        .enumerate()
        .map(|(i, action)| (i + 1, action.description().to_string()))
        .collect()
}
