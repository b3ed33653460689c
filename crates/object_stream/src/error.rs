use std::fmt;

use reqwest::StatusCode;
use serde_json::Error as JsonError;

/// Failure applying a single operation to the document.
///
/// Any of these poisons the stream: the accumulator does not attempt partial
/// recovery beyond the last fully-applied batch.
#[derive(Debug)]
pub enum ApplyError {
    TargetNotString {
        path: String,
        found: &'static str,
    },
    TargetNotArray {
        path: String,
        found: &'static str,
    },
    PathThroughNonContainer {
        path: String,
        segment: String,
        found: &'static str,
    },
    MissingTarget {
        path: String,
    },
    InvalidIndex {
        path: String,
        segment: String,
    },
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetNotString { path, found } => {
                write!(f, "append-text target at '{path}' is {found}, not a string")
            }
            Self::TargetNotArray { path, found } => {
                write!(f, "append-item target at '{path}' is {found}, not an array")
            }
            Self::PathThroughNonContainer {
                path,
                segment,
                found,
            } => write!(
                f,
                "path '{path}' descends through segment '{segment}' of non-container type {found}"
            ),
            Self::MissingTarget { path } => write!(f, "no value exists at path '{path}'"),
            Self::InvalidIndex { path, segment } => {
                write!(f, "segment '{segment}' in path '{path}' is not an array index")
            }
            Self::IndexOutOfBounds { path, index, len } => write!(
                f,
                "index {index} in path '{path}' is out of bounds for array of length {len}"
            ),
        }
    }
}

impl std::error::Error for ApplyError {}

/// Terminal decode/transport failure for an object stream.
#[derive(Debug)]
pub enum ObjectStreamError {
    UnsupportedContentType(Option<String>),
    UnsupportedFormat(Option<String>),
    EmptyBody,
    Status(StatusCode, String),
    Request(reqwest::Error),
    MalformedFrame {
        payload: String,
        source: JsonError,
    },
    Apply(ApplyError),
    Cancelled,
}

impl fmt::Display for ObjectStreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedContentType(found) => match found {
                Some(value) => write!(f, "response is not an event stream (content-type: {value})"),
                None => write!(f, "response is not an event stream (content-type missing)"),
            },
            Self::UnsupportedFormat(found) => match found {
                Some(value) => write!(f, "unsupported object-stream format token: {value}"),
                None => write!(f, "object-stream format header is missing"),
            },
            Self::EmptyBody => write!(f, "response has no body"),
            Self::Status(status, message) => write!(f, "HTTP {status} {message}"),
            Self::Request(error) => write!(f, "request error: {error}"),
            Self::MalformedFrame { payload, source } => {
                write!(f, "malformed operation frame '{payload}': {source}")
            }
            Self::Apply(error) => write!(f, "operation apply failure: {error}"),
            Self::Cancelled => write!(f, "stream read was cancelled"),
        }
    }
}

impl std::error::Error for ObjectStreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Request(error) => Some(error),
            Self::MalformedFrame { source, .. } => Some(source),
            Self::Apply(error) => Some(error),
            Self::UnsupportedContentType(_)
            | Self::UnsupportedFormat(_)
            | Self::EmptyBody
            | Self::Status(..)
            | Self::Cancelled => None,
        }
    }
}

impl From<reqwest::Error> for ObjectStreamError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error)
    }
}

impl From<ApplyError> for ObjectStreamError {
    fn from(error: ApplyError) -> Self {
        Self::Apply(error)
    }
}
