use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThreadError {
    #[error("message '{id}' does not exist in this thread")]
    UnknownMessage { id: String },

    #[error("parent id '{id}' does not exist in this thread")]
    DanglingParent { id: String },

    #[error("message id '{id}' already exists in this thread")]
    DuplicateId { id: String },

    #[error("operation requires an idle thread, but a run is in progress")]
    ThreadBusy,

    #[error("no run is in progress")]
    NoActiveRun,

    #[error("message '{id}' is not an assistant message and cannot be reloaded")]
    ReloadNotAssistant { id: String },

    #[error("message '{message_id}' has no tool-call part '{tool_call_id}'")]
    UnknownToolCall {
        message_id: String,
        tool_call_id: String,
    },

    #[error("tool call '{tool_call_id}' belongs to tool '{expected}', not '{requested}'")]
    ToolNameMismatch {
        tool_call_id: String,
        expected: String,
        requested: String,
    },

    #[error("tool call '{tool_call_id}' already has a result bound")]
    ToolResultAlreadySet { tool_call_id: String },
}
