//! Tree Module
//!
//! Presents archives, records, files and tags as one reconciling tree.
//!
//! ## Components
//! - `backing` - the objects a node can wrap, compared by identity
//! - `registry` / `kinds` - per-kind behaviour behind one generic node
//! - `node` - lazily reconciled nodes
//! - `walk` - cancellable whole-subtree expansion
//! - `bus` / `model` - explicit change notification for a view

mod backing;
mod bus;
mod kinds;
mod model;
mod node;
mod registry;
mod walk;

pub use backing::{Backing, BackingKind};
pub use bus::{ChangeBus, ChangeEvent};
pub use kinds::{ArchiveNodes, FileNodes, Icon, RecordNodes, TagNodes};
pub use model::TreeModel;
pub use node::{TreeNode, TreePath};
pub use registry::{NodeKind, NodeRegistry};
pub use walk::{CancellationToken, Walker};
