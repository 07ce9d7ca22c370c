//! Change bus
//!
//! In-process fan-out of [`ChangeEvent`]s to any number of subscribers.
//! Events only fire when a tree owner explicitly notifies, never from
//! backing mutations themselves.

use std::cell::RefCell;
use std::sync::mpsc::{channel, Receiver, Sender};

use super::node::{TreeNode, TreePath};

/// What a presentation layer needs to resync its rows
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    /// `nodes` appeared under `parent` at `indices`
    NodesAdded {
        parent: TreePath,
        indices: Vec<usize>,
        nodes: Vec<TreeNode>,
    },
    /// `nodes` disappeared from under `parent`
    NodesRemoved {
        parent: TreePath,
        nodes: Vec<TreeNode>,
    },
    /// `node`'s own row (name, value, icon) may have changed
    NodesChanged { parent: TreePath, node: TreeNode },
    /// Everything below `path` should be re-read
    StructureChanged { path: TreePath },
    /// Something changed; sent before the finer-grained events
    Changed,
}

/// Fan-out of change events
#[derive(Default)]
pub struct ChangeBus {
    subscribers: RefCell<Vec<Sender<ChangeEvent>>>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (sender, receiver) = channel();
        self.subscribers.borrow_mut().push(sender);
        receiver
    }

    /// Deliver `event` to all live subscribers, dropping ones that hung up
    pub fn emit(&self, event: ChangeEvent) {
        self.subscribers
            .borrow_mut()
            .retain(|sender| sender.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}
