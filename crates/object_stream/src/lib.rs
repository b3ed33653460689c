//! Wire codec and operation-log accumulator for `object-stream/v0`.
//!
//! This crate owns framing, header-contract validation, and generic patch
//! application only. It has no knowledge of message semantics; the payload of
//! every frame is an ordered batch of structural operations replayed onto a
//! JSON document.

pub mod accumulator;
pub mod decode;
pub mod encode;
pub mod error;
pub mod headers;
pub mod ops;
pub mod sse;

pub use accumulator::ObjectStreamAccumulator;
pub use decode::{decode_response, decode_response_collect, CancelSignal, DecodeSession};
pub use encode::{encode_batch, encode_batches};
pub use error::ObjectStreamError;
pub use headers::{response_headers, validate_response_headers, STREAM_FORMAT_TOKEN};
pub use ops::{ObjectStreamChunk, Operation};
pub use sse::SseFrameParser;
