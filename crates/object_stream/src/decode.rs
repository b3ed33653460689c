use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Response;
use serde_json::Value;

use crate::accumulator::ObjectStreamAccumulator;
use crate::error::ObjectStreamError;
use crate::headers::validate_response_headers;
use crate::ops::{ObjectStreamChunk, Operation};
use crate::sse::SseFrameParser;

/// Shared cancellation flag threaded through every blocking point.
pub type CancelSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Pull-based decode state folding SSE bytes into snapshots.
///
/// One session corresponds to one stream connection; sessions are restartable
/// per connection, not seekable.
#[derive(Debug, Default)]
pub struct DecodeSession {
    parser: SseFrameParser,
    accumulator: ObjectStreamAccumulator,
}

impl DecodeSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and drain the chunks completed by them.
    ///
    /// Each returned chunk pairs a decoded batch with the snapshot produced by
    /// applying it. The first error poisons the session; no partial snapshot
    /// beyond the last fully-applied batch is surfaced.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<ObjectStreamChunk>, ObjectStreamError> {
        let mut chunks = Vec::new();

        for payload in self.parser.feed(bytes) {
            let operations: Vec<Operation> =
                serde_json::from_str(&payload).map_err(|source| {
                    ObjectStreamError::MalformedFrame {
                        payload: payload.clone(),
                        source,
                    }
                })?;
            let snapshot = self.accumulator.append(&operations)?.clone();
            chunks.push(ObjectStreamChunk {
                snapshot,
                operations,
            });
        }

        Ok(chunks)
    }

    #[must_use]
    pub fn snapshot(&self) -> &Value {
        self.accumulator.snapshot()
    }

    /// Returns true when no partial frame is buffered.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.parser.is_empty_buffer()
    }
}

/// Decode an HTTP event-stream response, invoking `on_chunk` per batch.
///
/// Fails fast on the header contract before reading any body bytes.
/// Cancellation aborts the body read between chunks and surfaces as
/// [`ObjectStreamError::Cancelled`].
pub async fn decode_response<F>(
    response: Response,
    cancellation: Option<&CancelSignal>,
    mut on_chunk: F,
) -> Result<(), ObjectStreamError>
where
    F: FnMut(ObjectStreamChunk),
{
    let status = response.status();
    if !status.is_success() {
        let body = await_or_cancel(response.text(), cancellation)
            .await?
            .unwrap_or_else(|_| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        return Err(ObjectStreamError::Status(status, body));
    }

    validate_response_headers(response.headers())?;
    if response.content_length() == Some(0) {
        return Err(ObjectStreamError::EmptyBody);
    }

    let mut bytes = response.bytes_stream();
    let mut session = DecodeSession::new();

    loop {
        let Some(chunk) = await_or_cancel(bytes.next(), cancellation).await? else {
            break;
        };
        if is_cancelled(cancellation) {
            return Err(ObjectStreamError::Cancelled);
        }
        let chunk = chunk.map_err(ObjectStreamError::from)?;
        for decoded in session.feed(&chunk)? {
            on_chunk(decoded);
        }
    }

    if is_cancelled(cancellation) {
        return Err(ObjectStreamError::Cancelled);
    }

    Ok(())
}

/// Decode an entire response into its ordered chunk sequence.
pub async fn decode_response_collect(
    response: Response,
    cancellation: Option<&CancelSignal>,
) -> Result<Vec<ObjectStreamChunk>, ObjectStreamError> {
    let mut chunks = Vec::new();
    decode_response(response, cancellation, |chunk| chunks.push(chunk)).await?;
    Ok(chunks)
}

fn is_cancelled(cancel: Option<&CancelSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancelSignal>,
) -> Result<F::Output, ObjectStreamError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(ObjectStreamError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(ObjectStreamError::Cancelled);
            }
            return Ok(output);
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::DecodeSession;
    use crate::encode::encode_batches;
    use crate::error::ObjectStreamError;
    use crate::ops::Operation;

    #[test]
    fn decode_of_encode_yields_original_batches() {
        let batches = vec![
            vec![
                Operation::set(["message"], json!({"text": ""})),
                Operation::append_text(["message", "text"], "Hel"),
            ],
            Vec::new(),
            vec![Operation::append_text(["message", "text"], "lo")],
        ];
        let wire = encode_batches(&batches).expect("batches should encode");

        let mut session = DecodeSession::new();
        let chunks = session
            .feed(wire.as_bytes())
            .expect("encoded stream should decode");

        let decoded: Vec<_> = chunks.iter().map(|chunk| chunk.operations.clone()).collect();
        assert_eq!(decoded, batches);
        assert_eq!(*session.snapshot(), json!({"message": {"text": "Hello"}}));
        assert!(session.is_drained());
    }

    #[test]
    fn snapshots_match_direct_fold_per_batch() {
        let batches = vec![
            vec![Operation::set(["n"], json!(1))],
            vec![Operation::set(["n"], json!(2))],
        ];
        let wire = encode_batches(&batches).expect("batches should encode");

        let mut session = DecodeSession::new();
        let chunks = session.feed(wire.as_bytes()).expect("stream should decode");

        assert_eq!(chunks[0].snapshot, json!({"n": 1}));
        assert_eq!(chunks[1].snapshot, json!({"n": 2}));
    }

    #[test]
    fn malformed_frame_is_a_terminal_decode_error() {
        let mut session = DecodeSession::new();
        session
            .feed(b"data: [{\"type\":\"set\",\"path\":[\"a\"],\"value\":1}]\n\n")
            .expect("valid frame should decode");

        let error = session
            .feed(b"data: {not-json\n\n")
            .expect_err("malformed payload must fail");
        assert!(matches!(error, ObjectStreamError::MalformedFrame { .. }));

        // The last fully-applied batch remains visible.
        assert_eq!(*session.snapshot(), json!({"a": 1}));
    }

    #[test]
    fn split_frames_decode_across_feeds() {
        let mut session = DecodeSession::new();
        assert!(session
            .feed(b"data: [{\"type\":\"set\",\"path\":[\"a\"]")
            .expect("partial frame buffers")
            .is_empty());

        let chunks = session
            .feed(b",\"value\":true}]\n\n")
            .expect("completed frame decodes");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].snapshot, json!({"a": true}));
    }
}
