use serde::{Deserialize, Serialize};
use thread_model::{Message, Part, Role};

/// One element of a delta's content payload.
///
/// Plain text travels untyped; anything else arrives as a finished part and is
/// preserved as a discrete array entry on merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentDelta {
    Part(Part),
    Text { text: String },
}

impl ContentDelta {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Normalize into a part for merging.
    #[must_use]
    pub fn into_part(self) -> Part {
        match self {
            Self::Part(part) => part,
            Self::Text { text } => Part::Text { text },
        }
    }
}

/// Partial tool-call fragment, keyed by call index within the record.
///
/// `id` and `name` are present on the first fragment of a call; later
/// fragments carry only the next slice of argument text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallDelta {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub args_text: String,
}

impl ToolCallDelta {
    #[must_use]
    pub fn begin(index: usize, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index,
            id: Some(id.into()),
            name: Some(name.into()),
            args_text: String::new(),
        }
    }

    #[must_use]
    pub fn args(index: usize, args_text: impl Into<String>) -> Self {
        Self {
            index,
            id: None,
            name: None,
            args_text: args_text.into(),
        }
    }
}

/// Partial, keyed fragment of a message emitted during generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDelta {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default)]
    pub content: Vec<ContentDelta>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallDelta>,
}

impl MessageDelta {
    #[must_use]
    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: None,
            content: vec![ContentDelta::text(text)],
            tool_calls: Vec::new(),
        }
    }

    #[must_use]
    pub fn part(id: impl Into<String>, part: Part) -> Self {
        Self {
            id: id.into(),
            role: None,
            content: vec![ContentDelta::Part(part)],
            tool_calls: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }
}

/// Incoming accumulator event: a keyed delta or a fully-formed record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ChunkEvent {
    Delta(MessageDelta),
    Complete(Message),
}
