//! Undoable actions
//!
//! An action is a forward closure, its inverse, and a description. Batches
//! collapse into one composite action.

use std::fmt;

use tracing::warn;

use crate::error::Result;

/// One direction of an action
pub type ActionFn = Box<dyn Fn() -> Result<()>>;

enum ActionBody {
    Single { forward: ActionFn, inverse: ActionFn },
    Composite(Vec<UndoableAction>),
}

/// A reversible change
pub struct UndoableAction {
    description: String,
    body: ActionBody,
}

impl UndoableAction {
    pub fn new<F, I>(description: impl Into<String>, forward: F, inverse: I) -> Self
    where
        F: Fn() -> Result<()> + 'static,
        I: Fn() -> Result<()> + 'static,
    {
        Self {
            description: description.into(),
            body: ActionBody::Single {
                forward: Box::new(forward),
                inverse: Box::new(inverse),
            },
        }
    }

    /// Combine `actions` (in the order they were performed) into one
    pub fn merge(description: impl Into<String>, actions: Vec<UndoableAction>) -> Self {
        Self {
            description: description.into(),
            body: ActionBody::Composite(actions),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Number of single steps inside
    pub fn step_count(&self) -> usize {
        match &self.body {
            ActionBody::Single { .. } => 1,
            ActionBody::Composite(actions) => actions.iter().map(|a| a.step_count()).sum(),
        }
    }

    /// Run the change forward; composites replay their parts in order.
    ///
    /// If a part fails, the parts already applied are reverted again so the
    /// composite is all or nothing.
    pub fn apply(&self) -> Result<()> {
        match &self.body {
            ActionBody::Single { forward, .. } => forward(),
            ActionBody::Composite(actions) => {
                for (done, action) in actions.iter().enumerate() {
                    if let Err(e) = action.apply() {
                        for applied in actions[..done].iter().rev() {
                            if let Err(rollback) = applied.revert() {
                                warn!(
                                    description = applied.description(),
                                    "failed to roll back partial redo: {}", rollback
                                );
                            }
                        }
                        return Err(e);
                    }
                }
                Ok(())
            }
        }
    }

    /// Run the inverse; composites revert their parts last to first.
    ///
    /// If a part fails, the parts already reverted are applied again.
    pub fn revert(&self) -> Result<()> {
        match &self.body {
            ActionBody::Single { inverse, .. } => inverse(),
            ActionBody::Composite(actions) => {
                for (remaining, action) in actions.iter().enumerate().rev() {
                    if let Err(e) = action.revert() {
                        for reverted in &actions[remaining + 1..] {
                            if let Err(rollback) = reverted.apply() {
                                warn!(
                                    description = reverted.description(),
                                    "failed to roll back partial undo: {}", rollback
                                );
                            }
                        }
                        return Err(e);
                    }
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for UndoableAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoableAction")
            .field("description", &self.description)
            .field("steps", &self.step_count())
            .finish()
    }
}
