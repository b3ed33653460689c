use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use thread_model::{
    AppendMessage, CompleteReason, IncompleteReason, Message, MessageStatus, Part, Role,
    RunConfig, RunStep, StepUsage, ToolResultSubmission,
};

use crate::error::ThreadError;
use crate::tree::{BranchDirection, MessageTree, SwitchOutcome};

/// Phase of the per-thread run state machine.
///
/// `RequiresAction` is entered when a run's stream finishes while the pending
/// assistant message still has unsettled tool calls; the thread stays
/// non-idle until the last settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadPhase {
    Idle,
    Running,
    RequiresAction,
}

/// Result of accepting an [`AppendMessage`] command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    pub message_id: String,
    /// Pending assistant node id when the command started a run.
    pub pending_id: Option<String>,
}

#[derive(Debug)]
struct ActiveRun {
    /// Run-produced node ids in chain order; index-aligned with the record
    /// list of the feeding accumulator. The first entry is the pending
    /// assistant node created at run start.
    node_ids: Vec<String>,
    run_config: RunConfig,
}

/// Single-writer runtime owning one conversation's version tree.
///
/// All mutating operations execute on one sequential timeline; reads expose
/// whole, consistent states only.
#[derive(Debug)]
pub struct ThreadRuntime {
    tree: MessageTree,
    phase: ThreadPhase,
    active_run: Option<ActiveRun>,
}

impl Default for ThreadRuntime {
    fn default() -> Self {
        Self {
            tree: MessageTree::new(),
            phase: ThreadPhase::Idle,
            active_run: None,
        }
    }
}

impl ThreadRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> ThreadPhase {
        self.phase
    }

    #[must_use]
    pub fn message(&self, id: &str) -> Option<&Message> {
        self.tree.message(id)
    }

    /// Messages along the active root-to-leaf path.
    #[must_use]
    pub fn active_messages(&self) -> Vec<&Message> {
        self.tree.active_path()
    }

    pub fn branch_number(&self, id: &str) -> Result<usize, ThreadError> {
        self.tree.branch_number(id)
    }

    pub fn branch_count(&self, id: &str) -> Result<usize, ThreadError> {
        self.tree.branch_count(id)
    }

    /// Node currently being accumulated by the active run, if any.
    #[must_use]
    pub fn pending_message_id(&self) -> Option<&str> {
        self.active_run
            .as_ref()
            .and_then(|run| run.node_ids.last())
            .map(String::as_str)
    }

    /// Configuration of the active run, for the caller issuing the
    /// generation request.
    #[must_use]
    pub fn run_config(&self) -> Option<&RunConfig> {
        self.active_run.as_ref().map(|run| &run.run_config)
    }

    /// Accept an append/edit command.
    ///
    /// With `source_id` set, the new node becomes a sibling of the source
    /// under the same parent and the active path is re-rooted through it; the
    /// source node itself is left untouched. Rejected while a run is in
    /// progress.
    pub fn append(&mut self, command: AppendMessage) -> Result<AppendOutcome, ThreadError> {
        if self.phase != ThreadPhase::Idle {
            return Err(ThreadError::ThreadBusy);
        }

        let parent_id = match (&command.source_id, &command.parent_id) {
            (Some(source_id), _) => self
                .tree
                .parent_of(source_id)?
                .map(ToString::to_string),
            (None, Some(parent_id)) => {
                if !self.tree.contains(parent_id) {
                    return Err(ThreadError::DanglingParent {
                        id: parent_id.clone(),
                    });
                }
                Some(parent_id.clone())
            }
            (None, None) => self.tree.active_leaf_id().map(ToString::to_string),
        };

        let message = Message::new(
            Uuid::new_v4().to_string(),
            command.role,
            OffsetDateTime::now_utc(),
            command.content,
            MessageStatus::complete(CompleteReason::Stop),
        );
        let message_id = self.tree.insert_active(message, parent_id.as_deref())?;

        tracing::debug!(
            message_id = %message_id,
            edit_of = command.source_id.as_deref().unwrap_or(""),
            "message appended"
        );

        let pending_id = if command.start_run {
            Some(self.begin_run(
                Some(message_id.clone()),
                command.run_config.unwrap_or_default(),
            )?)
        } else {
            None
        };

        Ok(AppendOutcome {
            message_id,
            pending_id,
        })
    }

    /// Regenerate an assistant message: fork a new sibling under the same
    /// parent and start a run into it. Valid only on an assistant node while
    /// the thread is idle.
    pub fn reload(&mut self, message_id: &str) -> Result<String, ThreadError> {
        if self.phase != ThreadPhase::Idle {
            return Err(ThreadError::ThreadBusy);
        }

        let message = self
            .tree
            .message(message_id)
            .ok_or_else(|| ThreadError::UnknownMessage {
                id: message_id.to_string(),
            })?;
        match message.role {
            Role::Assistant => {}
            Role::System | Role::User | Role::Tool => {
                return Err(ThreadError::ReloadNotAssistant {
                    id: message_id.to_string(),
                })
            }
        }

        let parent_id = self.tree.parent_of(message_id)?.map(ToString::to_string);
        self.begin_run(parent_id, RunConfig::default())
    }

    /// Select the previous/next sibling of `message_id` and re-root the
    /// active path through it. Disabled at the edges; rejected while a run is
    /// in progress.
    pub fn switch_to_branch(
        &mut self,
        message_id: &str,
        direction: BranchDirection,
    ) -> Result<SwitchOutcome, ThreadError> {
        if self.phase != ThreadPhase::Idle {
            return Err(ThreadError::ThreadBusy);
        }

        let outcome = self.tree.switch_sibling(message_id, direction)?;
        if let SwitchOutcome::Switched { active_id } = &outcome {
            tracing::debug!(message_id = %message_id, active_id = %active_id, "branch switched");
        }

        Ok(outcome)
    }

    /// Bind a result to a tool-call part, exactly once.
    pub fn add_tool_result(
        &mut self,
        submission: ToolResultSubmission,
    ) -> Result<(), ThreadError> {
        let message = self.tree.message_mut(&submission.message_id)?;

        let position = message
            .content
            .iter()
            .position(|part| {
                matches!(
                    part,
                    Part::ToolCall { tool_call_id, .. }
                        if *tool_call_id == submission.tool_call_id
                )
            })
            .ok_or_else(|| ThreadError::UnknownToolCall {
                message_id: submission.message_id.clone(),
                tool_call_id: submission.tool_call_id.clone(),
            })?;

        let Part::ToolCall {
            tool_name,
            result,
            is_error,
            artifact,
            ..
        } = &mut message.content[position]
        else {
            return Err(ThreadError::UnknownToolCall {
                message_id: submission.message_id.clone(),
                tool_call_id: submission.tool_call_id.clone(),
            });
        };

        if *tool_name != submission.tool_name {
            return Err(ThreadError::ToolNameMismatch {
                tool_call_id: submission.tool_call_id.clone(),
                expected: tool_name.clone(),
                requested: submission.tool_name.clone(),
            });
        }
        if result.is_some() {
            return Err(ThreadError::ToolResultAlreadySet {
                tool_call_id: submission.tool_call_id.clone(),
            });
        }

        *result = Some(submission.result);
        *is_error = Some(submission.is_error);
        *artifact = submission.artifact;

        // Last settlement clears requires-action on the message.
        if !message.has_unsettled_tool_calls() {
            if let MessageStatus::RequiresAction { .. } = message.status {
                message.status = MessageStatus::complete(CompleteReason::Stop);
            }
        }

        tracing::debug!(
            message_id = %submission.message_id,
            tool_call_id = %submission.tool_call_id,
            "tool result bound"
        );

        if self.phase == ThreadPhase::RequiresAction && !self.run_requires_action() {
            self.phase = ThreadPhase::Idle;
            self.active_run = None;
        }

        Ok(())
    }

    /// Sync the feeding accumulator's record list into the tree.
    ///
    /// Record `i` updates the `i`-th run node in place; a new trailing record
    /// becomes a child of the previous run node and advances the active leaf.
    pub fn sync_run_records(&mut self, records: &[Message]) -> Result<(), ThreadError> {
        if self.phase != ThreadPhase::Running {
            return Err(ThreadError::NoActiveRun);
        }
        let run = self.active_run.as_mut().ok_or(ThreadError::NoActiveRun)?;

        for (index, record) in records.iter().enumerate() {
            if let Some(node_id) = run.node_ids.get(index) {
                let mut updated = record.clone();
                // Node ids are tree-stable; the first record adopts the
                // pending node's identity.
                updated.id = node_id.clone();
                *self.tree.message_mut(node_id)? = updated;
            } else {
                let parent_id = run.node_ids.last().cloned();
                self.tree
                    .insert_active(record.clone(), parent_id.as_deref())?;
                run.node_ids.push(record.id.clone());
            }
        }

        Ok(())
    }

    /// Terminalize the active run after its stream completed normally.
    ///
    /// Nodes with unsettled tool calls park in `requires-action` and keep the
    /// thread non-idle until settled.
    pub fn finish_run(
        &mut self,
        reason: CompleteReason,
        usage: Option<StepUsage>,
    ) -> Result<(), ThreadError> {
        if self.phase != ThreadPhase::Running {
            return Err(ThreadError::NoActiveRun);
        }
        let run = self.active_run.as_ref().ok_or(ThreadError::NoActiveRun)?;
        let node_ids = run.node_ids.clone();

        let mut requires_action = false;
        for node_id in &node_ids {
            let message = self.tree.message_mut(node_id)?;
            if message.is_terminal() {
                continue;
            }
            if message.has_unsettled_tool_calls() {
                message.status = MessageStatus::requires_action();
                requires_action = true;
            } else {
                message.status = MessageStatus::complete(reason);
            }
        }

        if let Some(last_id) = node_ids.last() {
            let message = self.tree.message_mut(last_id)?;
            message.metadata.steps.push(RunStep { usage });
        }

        if requires_action {
            self.phase = ThreadPhase::RequiresAction;
            tracing::info!(pending_id = %node_ids.last().map(String::as_str).unwrap_or(""), "run finished, awaiting tool results");
        } else {
            self.phase = ThreadPhase::Idle;
            self.active_run = None;
            tracing::info!("run finished");
        }

        Ok(())
    }

    /// Record a run-level failure as terminal node state, without throwing.
    ///
    /// The conversation remains usable afterward; retry is a new sibling via
    /// [`ThreadRuntime::reload`].
    pub fn fail_run(
        &mut self,
        reason: IncompleteReason,
        error: Option<Value>,
    ) -> Result<(), ThreadError> {
        if self.phase != ThreadPhase::Running {
            return Err(ThreadError::NoActiveRun);
        }
        let run = self.active_run.take().ok_or(ThreadError::NoActiveRun)?;

        for node_id in &run.node_ids {
            let message = self.tree.message_mut(node_id)?;
            if !message.is_terminal() {
                message.status = match &error {
                    Some(error) => {
                        MessageStatus::incomplete_with_error(reason, error.clone())
                    }
                    None => MessageStatus::incomplete(reason),
                };
            }
        }

        self.phase = ThreadPhase::Idle;
        tracing::warn!(?reason, "run failed");
        Ok(())
    }

    /// Abort the in-flight run, if any. Safe to call repeatedly; a no-op on
    /// an idle thread.
    pub fn cancel(&mut self) -> Result<(), ThreadError> {
        let Some(run) = self.active_run.take() else {
            return Ok(());
        };

        for node_id in &run.node_ids {
            let message = self.tree.message_mut(node_id)?;
            if !message.is_terminal() {
                message.status = MessageStatus::incomplete(IncompleteReason::Cancelled);
            }
        }

        self.phase = ThreadPhase::Idle;
        tracing::info!("run cancelled");
        Ok(())
    }

    fn begin_run(
        &mut self,
        parent_id: Option<String>,
        run_config: RunConfig,
    ) -> Result<String, ThreadError> {
        let pending = Message::new(
            Uuid::new_v4().to_string(),
            Role::Assistant,
            OffsetDateTime::now_utc(),
            Vec::new(),
            MessageStatus::Running,
        );
        let pending_id = self.tree.insert_active(pending, parent_id.as_deref())?;

        self.active_run = Some(ActiveRun {
            node_ids: vec![pending_id.clone()],
            run_config,
        });
        self.phase = ThreadPhase::Running;

        tracing::info!(pending_id = %pending_id, "run started");
        Ok(pending_id)
    }

    fn run_requires_action(&self) -> bool {
        let Some(run) = &self.active_run else {
            return false;
        };

        run.node_ids.iter().any(|node_id| {
            self.tree
                .message(node_id)
                .is_some_and(|message| {
                    matches!(message.status, MessageStatus::RequiresAction { .. })
                })
        })
    }
}
