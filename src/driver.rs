//! Cancellable loop feeding one generation run into a thread runtime.

use std::future::Future;
use std::sync::atomic::Ordering;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use serde_json::{json, Value};

use chunk_merge::{ChunkAccumulator, ChunkEvent};
use object_stream::CancelSignal;
use thread_model::{CompleteReason, IncompleteReason, StepUsage};
use thread_runtime::{ThreadError, ThreadPhase, ThreadRuntime};

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Lifecycle signal emitted by a generation source.
#[derive(Debug, Clone, PartialEq)]
pub enum RunSignal {
    Chunk(ChunkEvent),
    Finished {
        reason: CompleteReason,
        usage: Option<StepUsage>,
    },
    Failed {
        reason: IncompleteReason,
        error: Option<Value>,
    },
}

/// How a driven run ended. Run-level failures are recorded on the affected
/// node, not raised; only runtime usage errors surface as `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Stream finished; the thread is idle, or awaiting tool results when the
    /// final record carries unsettled tool calls.
    Completed,
    Cancelled,
    Failed,
}

/// Drive one run to a terminal state.
///
/// Pulls signals from `events`, merges chunk payloads through a fresh
/// [`ChunkAccumulator`], and syncs the merged records into `runtime` after
/// every signal. The cancellation flag is honored at every suspension point;
/// cancellation marks the in-progress node `incomplete(cancelled)` and stops
/// consuming further signals. The runtime must already be running (the
/// append/reload command that started the run establishes that).
pub async fn drive_run<S>(
    runtime: &mut ThreadRuntime,
    events: S,
    cancellation: Option<&CancelSignal>,
) -> Result<RunOutcome, ThreadError>
where
    S: Stream<Item = RunSignal>,
{
    if runtime.phase() != ThreadPhase::Running {
        return Err(ThreadError::NoActiveRun);
    }

    let mut accumulator = ChunkAccumulator::new();
    let mut events = Box::pin(events);

    loop {
        let signal = match await_or_cancel(events.next(), cancellation).await {
            Waited::Ready(signal) => signal,
            Waited::Cancelled => {
                runtime.cancel()?;
                return Ok(RunOutcome::Cancelled);
            }
        };

        match signal {
            Some(RunSignal::Chunk(event)) => {
                if let Err(error) = accumulator.push(event) {
                    tracing::warn!(%error, "malformed chunk aborted the run");
                    runtime.fail_run(
                        IncompleteReason::Error,
                        Some(json!({ "message": error.to_string() })),
                    )?;
                    return Ok(RunOutcome::Failed);
                }
                runtime.sync_run_records(accumulator.messages())?;
            }
            Some(RunSignal::Finished { reason, usage }) => {
                // Terminal statuses are the runtime's call: nodes with
                // unsettled tool calls park in requires-action instead of
                // completing.
                runtime.finish_run(reason, usage)?;
                return Ok(RunOutcome::Completed);
            }
            Some(RunSignal::Failed { reason, error }) => {
                runtime.fail_run(reason, error)?;
                return Ok(RunOutcome::Failed);
            }
            None => {
                // A source that stops without a terminal signal is a failure,
                // not a completion.
                runtime.fail_run(
                    IncompleteReason::Other,
                    Some(json!({
                        "message": "generation source exited without a terminal signal"
                    })),
                )?;
                return Ok(RunOutcome::Failed);
            }
        }
    }
}

enum Waited<T> {
    Ready(T),
    Cancelled,
}

fn is_cancelled(cancel: Option<&CancelSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

async fn await_or_cancel<F>(future: F, cancellation: Option<&CancelSignal>) -> Waited<F::Output>
where
    F: Future,
{
    if cancellation.is_none() {
        return Waited::Ready(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Waited::Cancelled;
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Waited::Cancelled;
            }
            return Waited::Ready(output);
        }
    }
}
