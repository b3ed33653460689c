use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One generic structural edit applied to the evolving document.
///
/// Path segments address object keys; array indices travel stringified, as on
/// the wire. The closed set of variants is the protocol surface: decoding a
/// frame with an unknown `type` is a fatal stream error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Operation {
    /// Set any value at a path, creating missing intermediate objects.
    Set { path: Vec<String>, value: Value },
    /// Append to an existing string at a path.
    AppendText { path: Vec<String>, value: String },
    /// Push an element onto an existing array at a path.
    AppendItem { path: Vec<String>, value: Value },
}

impl Operation {
    #[must_use]
    pub fn set(path: impl IntoPath, value: Value) -> Self {
        Self::Set {
            path: path.into_path(),
            value,
        }
    }

    #[must_use]
    pub fn append_text(path: impl IntoPath, value: impl Into<String>) -> Self {
        Self::AppendText {
            path: path.into_path(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn append_item(path: impl IntoPath, value: Value) -> Self {
        Self::AppendItem {
            path: path.into_path(),
            value,
        }
    }

    #[must_use]
    pub fn path(&self) -> &[String] {
        match self {
            Self::Set { path, .. } | Self::AppendText { path, .. } | Self::AppendItem { path, .. } => {
                path
            }
        }
    }
}

/// Path conversion helper so call sites can pass string slices.
pub trait IntoPath {
    fn into_path(self) -> Vec<String>;
}

impl IntoPath for Vec<String> {
    fn into_path(self) -> Vec<String> {
        self
    }
}

impl<const N: usize> IntoPath for [&str; N] {
    fn into_path(self) -> Vec<String> {
        self.iter().map(ToString::to_string).collect()
    }
}

impl IntoPath for &[&str] {
    fn into_path(self) -> Vec<String> {
        self.iter().map(ToString::to_string).collect()
    }
}

/// Decoded batch paired with the snapshot produced by applying it.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectStreamChunk {
    pub snapshot: Value,
    pub operations: Vec<Operation>,
}
