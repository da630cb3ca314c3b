//! Pawn actions.
//!
//! Every [`AiRequestPriority`](gametask_core::AiRequestPriority) level has its
//! own stack of actions. A newly pushed action pauses the top of its stack;
//! the top of the most important non-empty stack is the one that runs.

#![warn(missing_docs)]

mod action;
mod stack;
mod component;
pub mod builtin;

pub use action::{AbortState, ActionContext, ActionInfo, ActionResult, ActionSpec, PawnAction};
pub use stack::ActionStack;
pub use component::PawnActionsComponent;
pub use builtin::{SequenceAction, WaitAction};
