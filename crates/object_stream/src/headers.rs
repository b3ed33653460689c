use std::collections::BTreeMap;

use reqwest::header::HeaderMap;

use crate::error::ObjectStreamError;

pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_CACHE_CONTROL: &str = "Cache-Control";
pub const HEADER_CONNECTION: &str = "Connection";
pub const HEADER_STREAM_FORMAT: &str = "Object-Stream-Format";

pub const CONTENT_TYPE_EVENT_STREAM: &str = "text/event-stream";
/// Exact protocol-version token carried by the format header.
pub const STREAM_FORMAT_TOKEN: &str = "object-stream/v0";

/// Build the deterministic header map attached to every encoded stream.
///
/// Cache and keep-alive headers are included so intermediaries do not buffer
/// or cache the stream.
#[must_use]
pub fn response_headers() -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert(
        HEADER_CONTENT_TYPE.to_owned(),
        CONTENT_TYPE_EVENT_STREAM.to_owned(),
    );
    headers.insert(HEADER_CACHE_CONTROL.to_owned(), "no-cache".to_owned());
    headers.insert(HEADER_CONNECTION.to_owned(), "keep-alive".to_owned());
    headers.insert(
        HEADER_STREAM_FORMAT.to_owned(),
        STREAM_FORMAT_TOKEN.to_owned(),
    );
    headers
}

/// Reject a response whose headers do not carry the exact stream contract.
///
/// Fails before any body bytes are read; best-effort parsing of unrecognized
/// formats is explicitly not attempted.
pub fn validate_response_headers(headers: &HeaderMap) -> Result<(), ObjectStreamError> {
    let content_type = header_value(headers, HEADER_CONTENT_TYPE);
    if content_type.as_deref() != Some(CONTENT_TYPE_EVENT_STREAM) {
        return Err(ObjectStreamError::UnsupportedContentType(content_type));
    }

    let format = header_value(headers, HEADER_STREAM_FORMAT);
    if format.as_deref() != Some(STREAM_FORMAT_TOKEN) {
        return Err(ObjectStreamError::UnsupportedFormat(format));
    }

    Ok(())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_owned())
}
