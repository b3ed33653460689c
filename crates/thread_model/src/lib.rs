//! Shared thread data model: messages, parts, statuses, and commands.
//!
//! This crate intentionally defines only the contract types exchanged between
//! the stream accumulators and the version-tree runtime. It excludes transport
//! payloads, tree bookkeeping, and any persistence concerns.

mod command;
mod message;
mod status;

pub use command::{AppendMessage, RunConfig, ToolResultSubmission};
pub use message::{
    AudioFormat, Message, MessageMetadata, Part, Role, RunStep, SourceType, StepUsage,
};
pub use status::{
    CompleteReason, IncompleteReason, MessageStatus, PartStatus, RequiresActionReason,
};
