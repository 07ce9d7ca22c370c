//! Tests for UndoHistory
//!
//! These tests verify:
//! - Undo restores state after any sequence of actions, redo reapplies it
//! - Batches collapse into a single entry, nested batches into one
//! - Recording a new action clears the redo stack
//! - Descriptions and subscriber events
//! - Failing inverses leave the stacks consistent

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use tagtree::{HistoryEvent, TreeError, UndoHistory, UndoableAction};

// =============================================================================
// Helper Functions
// =============================================================================

/// An action appending `value` to `log`, undone by popping it
fn push_action(log: &Rc<RefCell<Vec<i32>>>, value: i32) -> UndoableAction {
    let forward = Rc::clone(log);
    let inverse = Rc::clone(log);
    UndoableAction::new(
        format!("push {}", value),
        move || {
            forward.borrow_mut().push(value);
            Ok(())
        },
        move || {
            inverse.borrow_mut().pop();
            Ok(())
        },
    )
}

/// An action adding `delta` to `counter`
fn add_action(counter: &Rc<RefCell<i64>>, delta: i64) -> UndoableAction {
    let forward = Rc::clone(counter);
    let inverse = Rc::clone(counter);
    UndoableAction::new(
        format!("add {}", delta),
        move || {
            *forward.borrow_mut() += delta;
            Ok(())
        },
        move || {
            *inverse.borrow_mut() -= delta;
            Ok(())
        },
    )
}

// =============================================================================
// Undo / Redo
// =============================================================================

#[test]
fn test_undo_then_redo_restores_each_state() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut history = UndoHistory::new();

    for value in 1..=3 {
        history.perform(push_action(&log, value)).unwrap();
    }
    assert_eq!(*log.borrow(), vec![1, 2, 3]);

    assert_eq!(history.undo(1).unwrap(), 1);
    assert_eq!(*log.borrow(), vec![1, 2]);
    assert_eq!(history.undo(2).unwrap(), 2);
    assert!(log.borrow().is_empty());
    assert!(!history.can_undo());

    assert_eq!(history.redo(3).unwrap(), 3);
    assert_eq!(*log.borrow(), vec![1, 2, 3]);
    assert!(!history.can_redo());
}

#[test]
fn test_undo_past_the_bottom_stops_early() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut history = UndoHistory::new();
    history.perform(push_action(&log, 1)).unwrap();

    assert_eq!(history.undo(5).unwrap(), 1);
    assert_eq!(history.undo(1).unwrap(), 0);
    assert_eq!(history.redo(5).unwrap(), 1);
}

#[test]
fn test_record_clears_redo() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut history = UndoHistory::new();
    history.perform(push_action(&log, 1)).unwrap();
    history.perform(push_action(&log, 2)).unwrap();
    history.undo(1).unwrap();
    assert!(history.can_redo());

    history.perform(push_action(&log, 9)).unwrap();

    assert!(!history.can_redo());
    assert_eq!(*log.borrow(), vec![1, 9]);
}

#[test]
fn test_record_does_not_run_the_action() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut history = UndoHistory::new();

    log.borrow_mut().push(7);
    history.record(push_action(&log, 7));
    assert_eq!(*log.borrow(), vec![7]);

    history.undo(1).unwrap();
    assert!(log.borrow().is_empty());
}

#[test]
fn test_failing_inverse_stays_on_undo_stack() {
    let mut history = UndoHistory::new();
    history.record(UndoableAction::new(
        "stuck",
        || Ok(()),
        || Err(TreeError::InvalidState("cannot revert".to_string())),
    ));

    let result = history.undo(1);

    assert!(matches!(result, Err(TreeError::InvalidState(_))));
    assert!(history.can_undo());
    assert!(!history.can_redo());
}

#[test]
fn test_failing_step_inside_batch_rolls_back_reverted_steps() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut history = UndoHistory::new();

    history.begin_batch();
    history.record(UndoableAction::new(
        "stuck",
        || Ok(()),
        || Err(TreeError::InvalidState("cannot revert".to_string())),
    ));
    history.perform(push_action(&log, 2)).unwrap();
    history.perform(push_action(&log, 3)).unwrap();
    history.end_batch("mixed", false);

    // pops 3 and 2, hits the stuck step, pushes 2 and 3 back
    assert!(history.undo(1).is_err());
    assert_eq!(*log.borrow(), vec![2, 3]);
    assert!(history.undo(1).is_err());
    assert_eq!(*log.borrow(), vec![2, 3]);
    assert!(history.can_undo());
    assert!(!history.can_redo());
}

#[test]
fn test_failing_forward_step_rolls_back_applied_steps() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let composite = UndoableAction::merge(
        "pair",
        vec![
            push_action(&log, 1),
            UndoableAction::new(
                "broken",
                || Err(TreeError::InvalidState("cannot apply".to_string())),
                || Ok(()),
            ),
        ],
    );

    assert!(composite.apply().is_err());
    assert!(log.borrow().is_empty());
}

// =============================================================================
// Batches
// =============================================================================

#[test]
fn test_batch_undoes_as_one_entry() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut history = UndoHistory::new();

    history.begin_batch();
    for value in 1..=4 {
        history.perform(push_action(&log, value)).unwrap();
    }
    assert!(!history.can_undo());
    history.end_batch("push four", false);

    assert_eq!(history.undo_descriptions(), vec![(1, "push four".to_string())]);
    history.undo(1).unwrap();
    assert!(log.borrow().is_empty());
    assert!(!history.can_undo());

    history.redo(1).unwrap();
    assert_eq!(*log.borrow(), vec![1, 2, 3, 4]);
}

#[test]
fn test_nested_batches_merge_at_outermost_close() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut history = UndoHistory::new();

    history.begin_batch();
    history.perform(push_action(&log, 1)).unwrap();
    history.begin_batch();
    history.perform(push_action(&log, 2)).unwrap();
    history.end_batch("inner", false);
    assert!(history.is_batching());
    assert!(!history.can_undo());
    history.perform(push_action(&log, 3)).unwrap();
    history.end_batch("outer", false);

    assert!(!history.is_batching());
    assert_eq!(history.undo_descriptions(), vec![(1, "outer".to_string())]);
    history.undo(1).unwrap();
    assert!(log.borrow().is_empty());
}

#[test]
fn test_single_action_batch_keeps_its_description() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut history = UndoHistory::new();

    history.begin_batch();
    history.perform(push_action(&log, 5)).unwrap();
    history.end_batch("group", false);
    assert_eq!(history.undo_descriptions()[0].1, "push 5");

    history.begin_batch();
    history.perform(push_action(&log, 6)).unwrap();
    history.end_batch("forced group", true);
    assert_eq!(history.undo_descriptions()[0].1, "forced group");
}

#[test]
fn test_empty_batch_adds_nothing() {
    let mut history = UndoHistory::new();

    history.begin_batch();
    history.end_batch("nothing", true);
    // closing with no open batch is ignored
    history.end_batch("stray", true);

    assert!(!history.can_undo());
    assert!(!history.is_batching());
}

#[test]
fn test_batch_end_clears_redo() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut history = UndoHistory::new();
    history.perform(push_action(&log, 1)).unwrap();
    history.undo(1).unwrap();

    history.begin_batch();
    history.perform(push_action(&log, 2)).unwrap();
    history.perform(push_action(&log, 3)).unwrap();
    history.end_batch("two", false);

    assert!(!history.can_redo());
}

// =============================================================================
// Descriptions and Events
// =============================================================================

#[test]
fn test_descriptions_are_most_recent_first() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut history = UndoHistory::new();
    for value in 1..=3 {
        history.perform(push_action(&log, value)).unwrap();
    }
    history.undo(1).unwrap();

    assert_eq!(
        history.undo_descriptions(),
        vec![(1, "push 2".to_string()), (2, "push 1".to_string())]
    );
    assert_eq!(history.redo_descriptions(), vec![(1, "push 3".to_string())]);
}

#[test]
fn test_subscribers_see_stack_changes() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut history = UndoHistory::new();
    let events = history.subscribe();

    history.perform(push_action(&log, 1)).unwrap();
    history.undo(1).unwrap();
    history.redo(1).unwrap();
    history.begin_batch();
    history.perform(push_action(&log, 2)).unwrap();
    history.perform(push_action(&log, 3)).unwrap();
    history.end_batch("pair", false);

    let seen: Vec<HistoryEvent> = events.try_iter().collect();
    assert_eq!(
        seen,
        vec![
            HistoryEvent::Recorded {
                description: "push 1".to_string()
            },
            HistoryEvent::Undone {
                description: "push 1".to_string()
            },
            HistoryEvent::Redone {
                description: "push 1".to_string()
            },
            HistoryEvent::BatchMerged {
                description: "pair".to_string(),
                actions: 2
            },
        ]
    );
}

#[test]
fn test_clear_drops_everything() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut history = UndoHistory::new();
    history.perform(push_action(&log, 1)).unwrap();
    history.perform(push_action(&log, 2)).unwrap();
    history.undo(1).unwrap();
    history.begin_batch();

    history.clear();

    assert!(!history.can_undo());
    assert!(!history.can_redo());
    assert!(!history.is_batching());
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_undo_all_restores_initial_state(deltas in prop::collection::vec(-100i64..100, 0..40)) {
        let counter = Rc::new(RefCell::new(0i64));
        let mut history = UndoHistory::new();
        for delta in &deltas {
            history.perform(add_action(&counter, *delta)).unwrap();
        }
        let expected: i64 = deltas.iter().sum();
        prop_assert_eq!(*counter.borrow(), expected);

        prop_assert_eq!(history.undo(deltas.len()).unwrap(), deltas.len());
        prop_assert_eq!(*counter.borrow(), 0);

        history.redo(deltas.len()).unwrap();
        prop_assert_eq!(*counter.borrow(), expected);
    }

    #[test]
    fn prop_batch_is_one_undo_step(deltas in prop::collection::vec(-100i64..100, 1..20)) {
        let counter = Rc::new(RefCell::new(0i64));
        let mut history = UndoHistory::new();
        history.begin_batch();
        for delta in &deltas {
            history.perform(add_action(&counter, *delta)).unwrap();
        }
        history.end_batch("batch", false);

        prop_assert_eq!(history.undo(1).unwrap(), 1);
        prop_assert_eq!(*counter.borrow(), 0);
        prop_assert!(!history.can_undo());
    }
}
