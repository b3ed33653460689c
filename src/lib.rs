//! Reconstructs a live, editable conversation from incremental event streams.
//!
//! Three pieces cooperate, composed here and usable separately:
//!
//! - [`object_stream`] decodes an SSE-framed operation log into running JSON
//!   snapshots (and encodes the reverse direction).
//! - [`chunk_merge`] folds keyed generation chunks into ordered, typed
//!   message records.
//! - [`thread_runtime`] owns the version tree: the visible branch path,
//!   edits, regeneration, branch switching, and tool-result settlement.
//!
//! [`driver::drive_run`] is the composition seam: it pulls generation signals
//! from a source, merges them, and feeds the runtime under a single logical
//! writer with first-class cancellation.

pub mod driver;

pub use chunk_merge;
pub use object_stream;
pub use thread_model;
pub use thread_runtime;

pub use chunk_merge::{ChunkAccumulator, ChunkEvent, ContentDelta, MessageDelta, ToolCallDelta};
pub use driver::{drive_run, RunOutcome, RunSignal};
pub use object_stream::{
    decode_response, decode_response_collect, encode_batch, encode_batches, CancelSignal,
    DecodeSession, ObjectStreamAccumulator, ObjectStreamChunk, ObjectStreamError, Operation,
};
pub use thread_model::{
    AppendMessage, AudioFormat, CompleteReason, IncompleteReason, Message, MessageMetadata,
    MessageStatus, Part, PartStatus, RequiresActionReason, Role, RunConfig, RunStep, SourceType,
    StepUsage, ToolResultSubmission,
};
pub use thread_runtime::{
    AppendOutcome, BranchDirection, MessageTree, SwitchOutcome, ThreadError, ThreadPhase,
    ThreadRuntime,
};
