use serde_json::Error as JsonError;

use crate::ops::Operation;
use crate::sse::encode_frame;

/// Encode one operation batch as a single SSE frame.
///
/// An empty batch is a valid frame carrying `[]`.
pub fn encode_batch(batch: &[Operation]) -> Result<String, JsonError> {
    Ok(encode_frame(&serde_json::to_string(batch)?))
}

/// Encode an ordered batch sequence as one contiguous SSE byte stream.
pub fn encode_batches(batches: &[Vec<Operation>]) -> Result<String, JsonError> {
    let mut out = String::new();
    for batch in batches {
        out.push_str(&encode_batch(batch)?);
    }
    Ok(out)
}
