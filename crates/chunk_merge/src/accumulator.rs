use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

use thread_model::{Message, MessageStatus, Part, Role};

use crate::event::{ChunkEvent, MessageDelta, ToolCallDelta};

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("tool-call fragment at index {index} for record '{record_id}' arrived before its id and name")]
    ToolCallFragmentWithoutIdentity { record_id: String, index: usize },
}

/// Per-record merge bookkeeping, index-aligned with the message list.
#[derive(Debug, Default)]
struct RecordBuild {
    in_progress: bool,
    /// Tool-call index -> position of the call's part in `content`.
    tool_call_parts: BTreeMap<usize, usize>,
}

/// Folds keyed generation chunks into ordered message records.
#[derive(Debug, Default)]
pub struct ChunkAccumulator {
    messages: Vec<Message>,
    builds: Vec<RecordBuild>,
}

impl ChunkAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All records, finalized and in-progress, in arrival order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns true while the trailing record is still accepting deltas.
    #[must_use]
    pub fn has_open_record(&self) -> bool {
        self.builds.last().is_some_and(|build| build.in_progress)
    }

    /// Merge one event and return the updated record list.
    pub fn push(&mut self, event: ChunkEvent) -> Result<&[Message], MergeError> {
        match event {
            ChunkEvent::Delta(delta) => self.apply_delta(delta)?,
            ChunkEvent::Complete(message) => self.apply_complete(message),
        }

        Ok(&self.messages)
    }

    /// Finalize every in-progress record with the given terminal status.
    pub fn finish_all(&mut self, status: &MessageStatus) -> &[Message] {
        for (message, build) in self.messages.iter_mut().zip(self.builds.iter_mut()) {
            if build.in_progress {
                message.status = status.clone();
                build.in_progress = false;
            }
        }

        &self.messages
    }

    fn apply_delta(&mut self, delta: MessageDelta) -> Result<(), MergeError> {
        if !self.merges_into_trailing(&delta) {
            let role = delta.role.unwrap_or(Role::Assistant);
            self.messages.push(Message::new(
                delta.id.clone(),
                role,
                OffsetDateTime::now_utc(),
                Vec::new(),
                MessageStatus::Running,
            ));
            self.builds.push(RecordBuild {
                in_progress: true,
                tool_call_parts: BTreeMap::new(),
            });
        }

        let position = self.messages.len() - 1;
        let message = &mut self.messages[position];
        let build = &mut self.builds[position];

        for element in delta.content {
            merge_part(&mut message.content, element.into_part());
        }
        merge_tool_calls(message, build, delta.tool_calls)?;

        Ok(())
    }

    /// A delta extends the trailing record only when that record is still
    /// open, shares its id, and does not contradict its role. Anything else
    /// is a record boundary rather than a dropped chunk.
    fn merges_into_trailing(&self, delta: &MessageDelta) -> bool {
        match (self.messages.last(), self.builds.last()) {
            (Some(last), Some(build)) => {
                build.in_progress
                    && last.id == delta.id
                    && delta.role.map_or(true, |role| role == last.role)
            }
            _ => false,
        }
    }

    fn apply_complete(&mut self, message: Message) {
        if let (Some(last), Some(build)) = (self.messages.last_mut(), self.builds.last_mut()) {
            if build.in_progress && last.id == message.id {
                // The fully-formed record supersedes the partial accumulation.
                *last = message;
                build.in_progress = false;
                build.tool_call_parts.clear();
                return;
            }
        }

        self.messages.push(message);
        self.builds.push(RecordBuild::default());
    }
}

fn merge_part(content: &mut Vec<Part>, part: Part) {
    match part {
        Part::Text { text } => {
            if let Some(Part::Text { text: tail }) = content.last_mut() {
                tail.push_str(&text);
            } else {
                content.push(Part::Text { text });
            }
        }
        other => content.push(other),
    }
}

fn merge_tool_calls(
    message: &mut Message,
    build: &mut RecordBuild,
    mut fragments: Vec<ToolCallDelta>,
) -> Result<(), MergeError> {
    fragments.sort_by_key(|fragment| fragment.index);

    for fragment in fragments {
        match build.tool_call_parts.get(&fragment.index) {
            Some(&part_position) => {
                if let Some(Part::ToolCall {
                    args, args_text, ..
                }) = message.content.get_mut(part_position)
                {
                    args_text.push_str(&fragment.args_text);
                    if let Ok(parsed) = serde_json::from_str::<Value>(args_text) {
                        *args = parsed;
                    }
                }
            }
            None => {
                let (Some(id), Some(name)) = (fragment.id, fragment.name) else {
                    return Err(MergeError::ToolCallFragmentWithoutIdentity {
                        record_id: message.id.clone(),
                        index: fragment.index,
                    });
                };

                let args = serde_json::from_str::<Value>(&fragment.args_text)
                    .unwrap_or(Value::Null);
                message
                    .content
                    .push(Part::tool_call(id, name, args, fragment.args_text));
                build
                    .tool_call_parts
                    .insert(fragment.index, message.content.len() - 1);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::OffsetDateTime;

    use thread_model::{CompleteReason, Message, MessageStatus, Part, Role};

    use crate::event::{ChunkEvent, MessageDelta, ToolCallDelta};

    use super::{ChunkAccumulator, MergeError};

    fn push_delta(accumulator: &mut ChunkAccumulator, delta: MessageDelta) {
        accumulator
            .push(ChunkEvent::Delta(delta))
            .expect("delta should merge");
    }

    #[test]
    fn chunks_with_one_id_merge_into_a_single_record() {
        let mut accumulator = ChunkAccumulator::new();
        push_delta(&mut accumulator, MessageDelta::text("run-1", ""));
        push_delta(&mut accumulator, MessageDelta::text("run-1", "Hello!"));
        push_delta(
            &mut accumulator,
            MessageDelta::text("run-1", " How may I assist you today?"),
        );

        let messages = accumulator.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text(), "Hello! How may I assist you today?");
    }

    #[test]
    fn a_new_id_starts_a_new_record() {
        let mut accumulator = ChunkAccumulator::new();
        push_delta(&mut accumulator, MessageDelta::text("run-1", ""));
        push_delta(&mut accumulator, MessageDelta::text("run-1", "Hello!"));
        push_delta(
            &mut accumulator,
            MessageDelta::text("run-2", " How may I assist you today?"),
        );

        let messages = accumulator.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text(), "Hello!");
        assert_eq!(messages[1].text(), " How may I assist you today?");
    }

    #[test]
    fn text_then_image_yields_two_discrete_parts() {
        let mut accumulator = ChunkAccumulator::new();
        push_delta(&mut accumulator, MessageDelta::text("run-1", "look:"));
        push_delta(
            &mut accumulator,
            MessageDelta::part(
                "run-1",
                Part::Image {
                    image: "data:image/png;base64,xyz".to_string(),
                },
            ),
        );

        let content = &accumulator.messages()[0].content;
        assert_eq!(content.len(), 2);
        assert!(matches!(content[0], Part::Text { ref text } if text == "look:"));
        assert!(matches!(content[1], Part::Image { .. }));
    }

    #[test]
    fn image_then_text_preserves_arrival_order() {
        let mut accumulator = ChunkAccumulator::new();
        push_delta(
            &mut accumulator,
            MessageDelta::part(
                "run-1",
                Part::Image {
                    image: "data:image/png;base64,xyz".to_string(),
                },
            ),
        );
        push_delta(&mut accumulator, MessageDelta::text("run-1", "caption"));

        let content = &accumulator.messages()[0].content;
        assert_eq!(content.len(), 2);
        assert!(matches!(content[0], Part::Image { .. }));
        assert!(matches!(content[1], Part::Text { ref text } if text == "caption"));
    }

    #[test]
    fn text_after_image_does_not_merge_into_earlier_run() {
        let mut accumulator = ChunkAccumulator::new();
        push_delta(&mut accumulator, MessageDelta::text("run-1", "before"));
        push_delta(
            &mut accumulator,
            MessageDelta::part(
                "run-1",
                Part::Image {
                    image: "img".to_string(),
                },
            ),
        );
        push_delta(&mut accumulator, MessageDelta::text("run-1", "after"));

        let content = &accumulator.messages()[0].content;
        assert_eq!(content.len(), 3);
        assert!(matches!(content[2], Part::Text { ref text } if text == "after"));
    }

    #[test]
    fn tool_call_fragments_accumulate_args_text_by_index() {
        let mut accumulator = ChunkAccumulator::new();
        push_delta(
            &mut accumulator,
            MessageDelta {
                id: "run-1".to_string(),
                role: None,
                content: Vec::new(),
                tool_calls: vec![ToolCallDelta::begin(0, "call-1", "search")],
            },
        );
        push_delta(
            &mut accumulator,
            MessageDelta {
                id: "run-1".to_string(),
                role: None,
                content: Vec::new(),
                tool_calls: vec![ToolCallDelta::args(0, r#"{"query":"#)],
            },
        );
        push_delta(
            &mut accumulator,
            MessageDelta {
                id: "run-1".to_string(),
                role: None,
                content: Vec::new(),
                tool_calls: vec![ToolCallDelta::args(0, r#""rust"}"#)],
            },
        );

        let content = &accumulator.messages()[0].content;
        assert_eq!(content.len(), 1);
        let Part::ToolCall {
            tool_call_id,
            tool_name,
            args,
            args_text,
            ..
        } = &content[0]
        else {
            panic!("expected a tool-call part");
        };
        assert_eq!(tool_call_id, "call-1");
        assert_eq!(tool_name, "search");
        assert_eq!(args_text, r#"{"query":"rust"}"#);
        assert_eq!(*args, json!({"query": "rust"}));
    }

    #[test]
    fn tool_call_fragment_without_identity_is_rejected() {
        let mut accumulator = ChunkAccumulator::new();
        let error = accumulator
            .push(ChunkEvent::Delta(MessageDelta {
                id: "run-1".to_string(),
                role: None,
                content: Vec::new(),
                tool_calls: vec![ToolCallDelta::args(3, "{}")],
            }))
            .expect_err("orphan fragment must be rejected");

        assert!(matches!(
            error,
            MergeError::ToolCallFragmentWithoutIdentity { index: 3, .. }
        ));
    }

    #[test]
    fn role_conflict_is_a_record_boundary_not_a_drop() {
        let mut accumulator = ChunkAccumulator::new();
        push_delta(
            &mut accumulator,
            MessageDelta::text("run-1", "thinking").with_role(Role::Assistant),
        );
        push_delta(
            &mut accumulator,
            MessageDelta::text("run-1", "tool output").with_role(Role::Tool),
        );

        let messages = accumulator.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::Assistant);
        assert_eq!(messages[1].role, Role::Tool);
        assert_eq!(messages[1].text(), "tool output");
    }

    #[test]
    fn complete_event_supersedes_open_record_with_same_id() {
        let mut accumulator = ChunkAccumulator::new();
        push_delta(&mut accumulator, MessageDelta::text("run-1", "partial"));

        let finalized = Message::new(
            "run-1",
            Role::Assistant,
            OffsetDateTime::UNIX_EPOCH,
            vec![Part::text("final text")],
            MessageStatus::complete(CompleteReason::Stop),
        );
        accumulator
            .push(ChunkEvent::Complete(finalized.clone()))
            .expect("complete event should merge");

        let messages = accumulator.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0], finalized);
        assert!(!accumulator.has_open_record());
    }

    #[test]
    fn complete_event_with_new_id_appends_verbatim() {
        let mut accumulator = ChunkAccumulator::new();
        push_delta(&mut accumulator, MessageDelta::text("run-1", "streaming"));

        let finalized = Message::new(
            "tool-9",
            Role::Tool,
            OffsetDateTime::UNIX_EPOCH,
            vec![Part::text("result")],
            MessageStatus::complete(CompleteReason::Stop),
        );
        accumulator
            .push(ChunkEvent::Complete(finalized.clone()))
            .expect("complete event should append");

        let messages = accumulator.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1], finalized);
        // Merging only ever targets the trailing record, so a later delta
        // reusing the old id seeds a fresh record.
        push_delta(&mut accumulator, MessageDelta::text("run-1", " more"));
        assert_eq!(accumulator.messages().len(), 3);
    }

    #[test]
    fn finish_all_applies_terminal_status_to_open_records() {
        let mut accumulator = ChunkAccumulator::new();
        push_delta(&mut accumulator, MessageDelta::text("run-1", "hello"));

        let status = MessageStatus::complete(CompleteReason::Stop);
        let messages = accumulator.finish_all(&status);
        assert_eq!(messages[0].status, status);
        assert!(!accumulator.has_open_record());
    }
}
