use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use futures_util::stream;
use serde_json::json;

use thread_loom::{
    drive_run, AppendMessage, BranchDirection, ChunkEvent, CompleteReason, IncompleteReason,
    MessageDelta, MessageStatus, Part, RunOutcome, RunSignal, StepUsage, SwitchOutcome,
    ThreadPhase, ThreadRuntime, ToolCallDelta, ToolResultSubmission,
};

fn chunk(delta: MessageDelta) -> RunSignal {
    RunSignal::Chunk(ChunkEvent::Delta(delta))
}

fn finished() -> RunSignal {
    RunSignal::Finished {
        reason: CompleteReason::Stop,
        usage: Some(StepUsage {
            prompt_tokens: 12,
            completion_tokens: 34,
        }),
    }
}

async fn run_turn(
    runtime: &mut ThreadRuntime,
    text: &str,
    signals: Vec<RunSignal>,
) -> (String, String, RunOutcome) {
    let outcome = runtime
        .append(AppendMessage::user(vec![Part::text(text)], None))
        .expect("append should succeed");
    let pending_id = outcome.pending_id.clone().expect("run should start");

    let run_outcome = drive_run(runtime, stream::iter(signals), None)
        .await
        .expect("drive should succeed");

    (outcome.message_id, pending_id, run_outcome)
}

#[tokio::test]
async fn full_turn_streams_into_the_active_path() {
    let mut runtime = ThreadRuntime::new();
    let signals = vec![
        chunk(MessageDelta::text("run-1", "")),
        chunk(MessageDelta::text("run-1", "Hello!")),
        chunk(MessageDelta::text("run-1", " How may I assist you today?")),
        finished(),
    ];

    let (user_id, pending_id, outcome) = run_turn(&mut runtime, "Hello!", signals).await;

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(runtime.phase(), ThreadPhase::Idle);

    let path: Vec<&str> = runtime
        .active_messages()
        .iter()
        .map(|message| message.id.as_str())
        .collect();
    assert_eq!(path, vec![user_id.as_str(), pending_id.as_str()]);

    let answer = runtime.message(&pending_id).expect("answer exists");
    assert_eq!(answer.text(), "Hello! How may I assist you today?");
    assert_eq!(
        answer.status,
        MessageStatus::complete(CompleteReason::Stop)
    );
    assert_eq!(
        answer.metadata.steps[0].usage,
        Some(StepUsage {
            prompt_tokens: 12,
            completion_tokens: 34,
        })
    );
}

#[tokio::test]
async fn mixed_content_stays_discrete_parts() {
    let mut runtime = ThreadRuntime::new();
    let signals = vec![
        chunk(MessageDelta::text("run-1", "here you go:")),
        chunk(MessageDelta::part(
            "run-1",
            Part::Image {
                image: "data:image/png;base64,abc".to_string(),
            },
        )),
        finished(),
    ];

    let (_, pending_id, _) = run_turn(&mut runtime, "draw me a chart", signals).await;

    let content = &runtime.message(&pending_id).expect("answer exists").content;
    assert_eq!(content.len(), 2);
    assert!(matches!(content[0], Part::Text { ref text } if text == "here you go:"));
    assert!(matches!(content[1], Part::Image { .. }));
}

#[tokio::test]
async fn regeneration_creates_switchable_siblings() {
    let mut runtime = ThreadRuntime::new();
    let first = vec![
        chunk(MessageDelta::text("run-1", "first answer")),
        finished(),
    ];
    let (_, first_id, _) = run_turn(&mut runtime, "question", first).await;

    let second_id = runtime.reload(&first_id).expect("reload should succeed");
    let second = vec![
        chunk(MessageDelta::text("run-2", "second answer")),
        finished(),
    ];
    drive_run(&mut runtime, stream::iter(second), None)
        .await
        .expect("drive should succeed");

    assert_eq!(runtime.branch_count(&first_id).expect("count"), 2);
    assert_eq!(runtime.branch_number(&first_id).expect("number"), 1);
    assert_eq!(runtime.branch_number(&second_id).expect("number"), 2);
    assert_eq!(
        runtime.message(&second_id).expect("second exists").text(),
        "second answer"
    );

    // The active path shows the regenerated answer; switching previous
    // restores the first one, and the edges stay disabled.
    let outcome = runtime
        .switch_to_branch(&second_id, BranchDirection::Previous)
        .expect("switch should succeed");
    assert_eq!(
        outcome,
        SwitchOutcome::Switched {
            active_id: first_id.clone()
        }
    );
    assert_eq!(
        runtime
            .switch_to_branch(&first_id, BranchDirection::Previous)
            .expect("switch should not error"),
        SwitchOutcome::Disabled
    );
}

#[tokio::test]
async fn tool_calls_park_the_thread_until_settled() {
    let mut runtime = ThreadRuntime::new();
    let signals = vec![
        chunk(MessageDelta {
            id: "run-1".to_string(),
            role: None,
            content: Vec::new(),
            tool_calls: vec![ToolCallDelta::begin(0, "call-1", "weather")],
        }),
        chunk(MessageDelta {
            id: "run-1".to_string(),
            role: None,
            content: Vec::new(),
            tool_calls: vec![ToolCallDelta::args(0, r#"{"city":"Berlin"}"#)],
        }),
        finished(),
    ];

    let (_, pending_id, outcome) = run_turn(&mut runtime, "weather in berlin?", signals).await;

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(runtime.phase(), ThreadPhase::RequiresAction);
    assert_eq!(
        runtime.message(&pending_id).expect("answer exists").status,
        MessageStatus::requires_action()
    );

    runtime
        .add_tool_result(ToolResultSubmission::new(
            pending_id.clone(),
            "weather",
            "call-1",
            json!({"celsius": 21}),
        ))
        .expect("settlement should succeed");

    assert_eq!(runtime.phase(), ThreadPhase::Idle);
    assert_eq!(
        runtime.message(&pending_id).expect("answer exists").status,
        MessageStatus::complete(CompleteReason::Stop)
    );
}

#[tokio::test]
async fn source_failure_is_recorded_not_thrown() {
    let mut runtime = ThreadRuntime::new();
    let signals = vec![
        chunk(MessageDelta::text("run-1", "partial out")),
        RunSignal::Failed {
            reason: IncompleteReason::ContentFilter,
            error: Some(json!({"message": "flagged"})),
        },
    ];

    let (_, pending_id, outcome) = run_turn(&mut runtime, "hi", signals).await;

    assert_eq!(outcome, RunOutcome::Failed);
    assert_eq!(runtime.phase(), ThreadPhase::Idle);
    assert_eq!(
        runtime.message(&pending_id).expect("node exists").status,
        MessageStatus::incomplete_with_error(
            IncompleteReason::ContentFilter,
            json!({"message": "flagged"})
        )
    );

    // Retry via reload keeps the conversation usable.
    runtime.reload(&pending_id).expect("reload should succeed");
    assert_eq!(runtime.phase(), ThreadPhase::Running);
}

#[tokio::test]
async fn source_exiting_without_terminal_signal_fails_the_run() {
    let mut runtime = ThreadRuntime::new();
    let signals = vec![chunk(MessageDelta::text("run-1", "never finished"))];

    let (_, pending_id, outcome) = run_turn(&mut runtime, "hi", signals).await;

    assert_eq!(outcome, RunOutcome::Failed);
    let status = &runtime.message(&pending_id).expect("node exists").status;
    assert!(matches!(
        status,
        MessageStatus::Incomplete {
            reason: IncompleteReason::Other,
            ..
        }
    ));
}

#[tokio::test]
async fn pre_cancelled_run_marks_the_node_cancelled() {
    let mut runtime = ThreadRuntime::new();
    let outcome = runtime
        .append(AppendMessage::user(vec![Part::text("hi")], None))
        .expect("append should succeed");
    let pending_id = outcome.pending_id.expect("run should start");

    let cancel = Arc::new(AtomicBool::new(true));
    let run_outcome = drive_run(
        &mut runtime,
        stream::iter(vec![
            chunk(MessageDelta::text("run-1", "should not land")),
            finished(),
        ]),
        Some(&cancel),
    )
    .await
    .expect("drive should succeed");

    assert_eq!(run_outcome, RunOutcome::Cancelled);
    assert_eq!(runtime.phase(), ThreadPhase::Idle);
    let node = runtime.message(&pending_id).expect("node exists");
    assert_eq!(
        node.status,
        MessageStatus::incomplete(IncompleteReason::Cancelled)
    );
    assert!(node.content.is_empty());
}
