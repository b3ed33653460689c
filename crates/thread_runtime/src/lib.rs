//! Version-tree runtime for branching conversations.
//!
//! Owns the set of message records as a forest: every message optionally has
//! a parent, siblings are alternate versions at the same position, and exactly
//! one root-to-leaf path is visible at a time. Local mutations (edit, reload,
//! tool-result settlement) fork or extend the tree; they never delete nodes.

mod error;
mod runtime;
mod tree;

pub use error::ThreadError;
pub use runtime::{AppendOutcome, ThreadPhase, ThreadRuntime};
pub use tree::{BranchDirection, MessageTree, SwitchOutcome};
