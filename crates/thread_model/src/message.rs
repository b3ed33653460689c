use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::status::{MessageStatus, PartStatus};

/// Speaker role of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Wav,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Url,
}

/// One ordered content element of a message.
///
/// A `ToolCall` part's `result` may be set at most once; after settlement the
/// part is frozen. Settlement is mediated by the runtime, which rejects
/// unknown ids and mismatched tool names before touching the part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Part {
    #[serde(rename_all = "camelCase")]
    Text { text: String },
    #[serde(rename_all = "camelCase")]
    Reasoning { text: String },
    #[serde(rename_all = "camelCase")]
    Source {
        source_type: SourceType,
        id: String,
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Image { image: String },
    #[serde(rename_all = "camelCase")]
    File { data: String, mime_type: String },
    #[serde(rename_all = "camelCase")]
    Audio { data: String, format: AudioFormat },
    #[serde(rename_all = "camelCase")]
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        args: Value,
        args_text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        artifact: Option<Value>,
    },
}

impl Part {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    #[must_use]
    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::Reasoning { text: text.into() }
    }

    /// Constructs an unsettled tool-call part from streamed fragments.
    #[must_use]
    pub fn tool_call(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        args: Value,
        args_text: impl Into<String>,
    ) -> Self {
        Self::ToolCall {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            args,
            args_text: args_text.into(),
            result: None,
            is_error: None,
            artifact: None,
        }
    }

    /// Returns true for a tool-call part whose result has been bound.
    #[must_use]
    pub fn is_settled_tool_call(&self) -> bool {
        match self {
            Self::ToolCall { result, .. } => result.is_some(),
            Self::Text { .. }
            | Self::Reasoning { .. }
            | Self::Source { .. }
            | Self::Image { .. }
            | Self::File { .. }
            | Self::Audio { .. } => false,
        }
    }

    /// Returns true for a tool-call part still awaiting its result.
    #[must_use]
    pub fn is_unsettled_tool_call(&self) -> bool {
        match self {
            Self::ToolCall { result, .. } => result.is_none(),
            Self::Text { .. }
            | Self::Reasoning { .. }
            | Self::Source { .. }
            | Self::Image { .. }
            | Self::File { .. }
            | Self::Audio { .. } => false,
        }
    }
}

/// Token usage reported for one generation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// One generation step recorded in message metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStep {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<StepUsage>,
}

/// Free-form and structured metadata attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    #[serde(default)]
    pub steps: Vec<RunStep>,
    #[serde(default)]
    pub custom: Map<String, Value>,
}

/// A single conversation message.
///
/// While a generation is in progress the record is mutable-by-append only;
/// once `status` reaches a terminal value the record is frozen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub content: Vec<Part>,
    pub status: MessageStatus,
    #[serde(default)]
    pub metadata: MessageMetadata,
}

impl Message {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        role: Role,
        created_at: OffsetDateTime,
        content: Vec<Part>,
        status: MessageStatus,
    ) -> Self {
        Self {
            id: id.into(),
            role,
            created_at,
            content,
            status,
            metadata: MessageMetadata::default(),
        }
    }

    /// Concatenated text of all text parts, in content order.
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::new();
        for part in &self.content {
            if let Part::Text { text } = part {
                out.push_str(text);
            }
        }
        out
    }

    /// Tool-call parts still awaiting settlement.
    pub fn unsettled_tool_calls(&self) -> impl Iterator<Item = &Part> {
        self.content
            .iter()
            .filter(|part| part.is_unsettled_tool_call())
    }

    #[must_use]
    pub fn has_unsettled_tool_calls(&self) -> bool {
        self.unsettled_tool_calls().next().is_some()
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Part-level status derived from the owning message.
    ///
    /// While a message is still accepting appends, only its trailing part is
    /// extending; earlier parts read as complete. Terminal message statuses
    /// propagate to every part.
    #[must_use]
    pub fn part_status(&self, index: usize) -> PartStatus {
        match &self.status {
            MessageStatus::Running | MessageStatus::RequiresAction { .. } => {
                if index + 1 == self.content.len() {
                    PartStatus::Running
                } else {
                    PartStatus::Complete
                }
            }
            MessageStatus::Complete { .. } => PartStatus::Complete,
            MessageStatus::Incomplete { reason, error } => PartStatus::Incomplete {
                reason: *reason,
                error: error.clone(),
            },
        }
    }
}
