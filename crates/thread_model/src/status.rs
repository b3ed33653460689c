use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reason a message reached `complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompleteReason {
    Stop,
    Unknown,
}

/// Reason a message reached `incomplete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IncompleteReason {
    Cancelled,
    ToolCalls,
    Length,
    ContentFilter,
    Other,
    Error,
}

/// Reason a message is parked in `requires-action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequiresActionReason {
    ToolCalls,
}

/// Message-level lifecycle status.
///
/// `RequiresAction` blocks the owning message from entering `Complete` until
/// every tool-call part in it is settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessageStatus {
    Running,
    RequiresAction {
        reason: RequiresActionReason,
    },
    Complete {
        reason: CompleteReason,
    },
    Incomplete {
        reason: IncompleteReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<Value>,
    },
}

impl MessageStatus {
    /// Returns true once the status can no longer change.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Running | Self::RequiresAction { .. } => false,
            Self::Complete { .. } | Self::Incomplete { .. } => true,
        }
    }

    #[must_use]
    pub fn requires_action() -> Self {
        Self::RequiresAction {
            reason: RequiresActionReason::ToolCalls,
        }
    }

    #[must_use]
    pub fn complete(reason: CompleteReason) -> Self {
        Self::Complete { reason }
    }

    #[must_use]
    pub fn incomplete(reason: IncompleteReason) -> Self {
        Self::Incomplete {
            reason,
            error: None,
        }
    }

    #[must_use]
    pub fn incomplete_with_error(reason: IncompleteReason, error: Value) -> Self {
        Self::Incomplete {
            reason,
            error: Some(error),
        }
    }
}

/// Part-level status. Mirrors [`MessageStatus`] minus `RequiresAction`,
/// which exists per-part only on tool-call parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PartStatus {
    Running,
    Complete,
    Incomplete {
        reason: IncompleteReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<Value>,
    },
}
