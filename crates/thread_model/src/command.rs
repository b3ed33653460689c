use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::message::{Part, Role};

/// Caller-supplied configuration forwarded to the generation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    #[serde(default)]
    pub custom: Map<String, Value>,
}

/// Command to insert a message into the version tree.
///
/// `source_id` is set when the command is an edit of an existing message; the
/// edited message becomes a non-active sibling of the new one. `start_run`
/// signals whether acceptance should immediately trigger a new generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendMessage {
    pub role: Role,
    pub content: Vec<Part>,
    pub parent_id: Option<String>,
    pub source_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_config: Option<RunConfig>,
    #[serde(default)]
    pub start_run: bool,
}

impl AppendMessage {
    /// Appends fresh user content under `parent_id` and starts a run.
    #[must_use]
    pub fn user(content: Vec<Part>, parent_id: Option<String>) -> Self {
        Self {
            role: Role::User,
            content,
            parent_id,
            source_id: None,
            run_config: None,
            start_run: true,
        }
    }

    /// Edits `source_id`, forking a sibling that carries the new content.
    #[must_use]
    pub fn edit(source_id: impl Into<String>, content: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            content,
            parent_id: None,
            source_id: Some(source_id.into()),
            run_config: None,
            start_run: true,
        }
    }

    #[must_use]
    pub fn with_run_config(mut self, run_config: RunConfig) -> Self {
        self.run_config = Some(run_config);
        self
    }

    #[must_use]
    pub fn without_run(mut self) -> Self {
        self.start_run = false;
        self
    }
}

/// Command binding a result to an in-flight tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultSubmission {
    pub message_id: String,
    pub tool_name: String,
    pub tool_call_id: String,
    pub result: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Value>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResultSubmission {
    #[must_use]
    pub fn new(
        message_id: impl Into<String>,
        tool_name: impl Into<String>,
        tool_call_id: impl Into<String>,
        result: Value,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            tool_name: tool_name.into(),
            tool_call_id: tool_call_id.into(),
            result,
            artifact: None,
            is_error: false,
        }
    }

    #[must_use]
    pub fn with_artifact(mut self, artifact: Value) -> Self {
        self.artifact = Some(artifact);
        self
    }

    #[must_use]
    pub fn as_error(mut self) -> Self {
        self.is_error = true;
        self
    }
}
