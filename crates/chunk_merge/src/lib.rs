//! Keyed chunk accumulator.
//!
//! Merges externally-sourced generation chunks, keyed by a stream id, into an
//! ordered list of typed message records. Chunks sharing the trailing record's
//! id extend that record; any other id starts a new record. Callers must
//! guarantee at-most-once delivery per chunk: re-delivery of a merged chunk is
//! indistinguishable from a new chunk with the same id.

mod accumulator;
mod event;

pub use accumulator::{ChunkAccumulator, MergeError};
pub use event::{ChunkEvent, ContentDelta, MessageDelta, ToolCallDelta};
