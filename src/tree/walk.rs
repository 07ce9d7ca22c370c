//! Subtree walks with cooperative cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::config::Config;
use crate::error::{Result, TreeError};

use super::node::TreeNode;

/// Flag a long walk polls; cancel from anywhere, including another thread
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Depth-first materializer for whole subtrees
#[derive(Debug, Clone)]
pub struct Walker {
    /// Nodes visited between cancellation checks
    poll_interval: usize,
}

impl Default for Walker {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl Walker {
    pub fn new(config: &Config) -> Self {
        Self {
            poll_interval: config.cancel_poll_interval.max(1),
        }
    }

    /// Reconcile every node below `root` (pre-order), calling `on_node` for
    /// each one including `root`. Returns the number of nodes visited.
    ///
    /// Records along the way are loaded. The token is checked before the
    /// first node and then every `poll_interval` nodes; a cancelled walk
    /// returns [`TreeError::Cancelled`] and leaves what it already
    /// reconciled in place.
    pub fn expand_all<F>(&self, root: &TreeNode, cancel: &CancellationToken, mut on_node: F) -> Result<usize>
    where
        F: FnMut(&TreeNode),
    {
        let mut stack = vec![root.clone()];
        let mut visited = 0usize;

        while let Some(node) = stack.pop() {
            if visited % self.poll_interval == 0 && cancel.is_cancelled() {
                debug!(visited, "walk cancelled");
                return Err(TreeError::Cancelled);
            }
            visited += 1;
            on_node(&node);

            let children = node.children()?;
            stack.extend(children.into_iter().rev());
        }

        // counts were summed top-down, before deeper levels were reconciled
        refresh_counts(root)?;
        Ok(visited)
    }
}

/// Recompute cached descendant counts bottom-up over already reconciled nodes
fn refresh_counts(node: &TreeNode) -> Result<()> {
    for child in node.cached_children() {
        refresh_counts(&child)?;
    }
    node.refresh_children()?;
    Ok(())
}

impl TreeNode {
    /// [`Walker::expand_all`] with the default poll interval
    pub fn expand_all<F>(&self, cancel: &CancellationToken, on_node: F) -> Result<usize>
    where
        F: FnMut(&TreeNode),
    {
        Walker::default().expand_all(self, cancel, on_node)
    }
}
