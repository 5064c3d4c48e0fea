// ABOUTME: Translates a run's upstream event stream into the outward event protocol for one chat turn.
// ABOUTME: Guarantees order, incremental delivery, and a terminal done event even when the run fails.

use std::collections::VecDeque;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::time::Instant;

use prism_core::{DoneStatus, MessagePart, OutwardEvent, PartDelta, RunError, RunEvent, RunStream};

/// Map one upstream event to at most one outward event. Events with no outward
/// counterpart return `Ok(None)`.
pub fn translate_event(event: RunEvent) -> Result<Option<OutwardEvent>, RunError> {
    let outward = match event {
        RunEvent::PartStart { part, .. } => match part {
            MessagePart::Text { content } if !content.is_empty() => {
                Some(OutwardEvent::TextDelta { delta: content })
            }
            MessagePart::Text { .. }
            | MessagePart::Thinking { .. }
            | MessagePart::ToolCall(_)
            | MessagePart::SystemPrompt { .. }
            | MessagePart::UserPrompt { .. }
            | MessagePart::ToolReturn { .. } => None,
        },
        RunEvent::PartDelta { delta, .. } => match delta {
            PartDelta::Text { content_delta } => Some(OutwardEvent::TextDelta {
                delta: content_delta,
            }),
            PartDelta::Thinking { content_delta } => Some(OutwardEvent::ThinkingDelta {
                delta: content_delta,
            }),
            PartDelta::ToolCallArgs { .. } => None,
        },
        RunEvent::FinalResult { .. } => None,
        RunEvent::ToolCallStarted { part } => Some(OutwardEvent::ToolCallExecuting {
            arguments: part.args_as_map()?,
            tool_call_id: part.tool_call_id,
            tool_name: part.tool_name,
        }),
        RunEvent::ToolCallResult {
            tool_call_id,
            result,
            ..
        } => Some(OutwardEvent::ToolResult {
            tool_call_id,
            result,
        }),
        RunEvent::RunComplete { pending } => {
            let status = if pending.is_empty() {
                DoneStatus::Complete
            } else {
                DoneStatus::PendingApproval
            };
            Some(OutwardEvent::Done { status })
        }
    };
    Ok(outward)
}

struct Translator {
    run: RunStream,
    deadline: Option<(Instant, Duration)>,
    queued: VecDeque<OutwardEvent>,
    finished: bool,
}

impl Translator {
    async fn next_outward(&mut self) -> Option<OutwardEvent> {
        loop {
            if let Some(event) = self.queued.pop_front() {
                return Some(event);
            }
            if self.finished {
                return None;
            }

            let next = match self.deadline {
                Some((deadline, limit)) => {
                    match tokio::time::timeout_at(deadline, self.run.next()).await {
                        Ok(next) => next,
                        Err(_) => {
                            tracing::warn!(timeout_secs = limit.as_secs(), "agent run timed out");
                            return Some(self.fail(format!(
                                "agent run timed out after {}s",
                                limit.as_secs()
                            )));
                        }
                    }
                }
                None => self.run.next().await,
            };

            match next {
                Some(Ok(event)) => match translate_event(event) {
                    Ok(Some(outward)) => {
                        if outward.is_terminal() {
                            self.finished = true;
                        }
                        return Some(outward);
                    }
                    Ok(None) => continue,
                    Err(e) => return Some(self.fail(e.to_string())),
                },
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "agent run failed");
                    return Some(self.fail(e.to_string()));
                }
                None => {
                    // Upstream ended without a completion event.
                    self.finished = true;
                    return Some(OutwardEvent::done(DoneStatus::Complete));
                }
            }
        }
    }

    fn fail(&mut self, message: String) -> OutwardEvent {
        self.finished = true;
        self.queued.push_back(OutwardEvent::done(DoneStatus::Complete));
        OutwardEvent::error(message)
    }
}

/// Consume `run` lazily and yield outward events as they are produced.
///
/// Any upstream error becomes `error` followed by `done(complete)`, after which the
/// stream ends and the run is dropped. With a `timeout`, a run still going when it
/// elapses is treated the same way.
pub fn translate(run: RunStream, timeout: Option<Duration>) -> BoxStream<'static, OutwardEvent> {
    let translator = Translator {
        run,
        deadline: timeout.map(|limit| (Instant::now() + limit, limit)),
        queued: VecDeque::new(),
        finished: false,
    };

    stream::unfold(translator, |mut translator| async move {
        let event = translator.next_outward().await?;
        Some((event, translator))
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::{PendingApproval, ToolArgs, ToolCallPart};
    use serde_json::{Map, json};

    fn run_of(items: Vec<Result<RunEvent, RunError>>) -> RunStream {
        Box::pin(stream::iter(items))
    }

    async fn collect(run: RunStream) -> Vec<OutwardEvent> {
        translate(run, None).collect().await
    }

    #[tokio::test]
    async fn text_tool_and_completion_map_in_order() {
        let run = run_of(vec![
            Ok(RunEvent::PartStart {
                index: 0,
                part: MessagePart::text("Hi"),
            }),
            Ok(RunEvent::PartDelta {
                index: 0,
                delta: PartDelta::Text {
                    content_delta: " there".to_string(),
                },
            }),
            Ok(RunEvent::ToolCallStarted {
                part: ToolCallPart::new("1", "f", Map::new()),
            }),
            Ok(RunEvent::ToolCallResult {
                tool_call_id: "1".to_string(),
                tool_name: "f".to_string(),
                result: json!(42),
            }),
            Ok(RunEvent::RunComplete { pending: vec![] }),
        ]);

        let events = collect(run).await;
        assert_eq!(
            events,
            vec![
                OutwardEvent::text("Hi"),
                OutwardEvent::text(" there"),
                OutwardEvent::ToolCallExecuting {
                    tool_call_id: "1".to_string(),
                    tool_name: "f".to_string(),
                    arguments: Map::new(),
                },
                OutwardEvent::ToolResult {
                    tool_call_id: "1".to_string(),
                    result: json!(42),
                },
                OutwardEvent::done(DoneStatus::Complete),
            ]
        );
    }

    #[tokio::test]
    async fn failure_mid_run_yields_error_then_done() {
        let run = run_of(vec![
            Ok(RunEvent::PartStart {
                index: 0,
                part: MessagePart::text("partial"),
            }),
            Err(RunError::Runtime("model unavailable".to_string())),
            Ok(RunEvent::PartDelta {
                index: 0,
                delta: PartDelta::Text {
                    content_delta: "never seen".to_string(),
                },
            }),
        ]);

        let events = collect(run).await;
        assert_eq!(
            events,
            vec![
                OutwardEvent::text("partial"),
                OutwardEvent::error("model unavailable"),
                OutwardEvent::done(DoneStatus::Complete),
            ]
        );
    }

    #[tokio::test]
    async fn unmapped_events_are_dropped() {
        let run = run_of(vec![
            Ok(RunEvent::PartStart {
                index: 0,
                part: MessagePart::Thinking {
                    content: String::new(),
                },
            }),
            Ok(RunEvent::PartDelta {
                index: 0,
                delta: PartDelta::Thinking {
                    content_delta: "pondering".to_string(),
                },
            }),
            Ok(RunEvent::PartStart {
                index: 1,
                part: MessagePart::ToolCall(ToolCallPart::new("c", "f", Map::new())),
            }),
            Ok(RunEvent::PartDelta {
                index: 1,
                delta: PartDelta::ToolCallArgs {
                    args_delta: "{}".to_string(),
                },
            }),
            Ok(RunEvent::PartStart {
                index: 2,
                part: MessagePart::text(""),
            }),
            Ok(RunEvent::FinalResult { tool_name: None }),
            Ok(RunEvent::RunComplete { pending: vec![] }),
        ]);

        let events = collect(run).await;
        assert_eq!(
            events,
            vec![
                OutwardEvent::thinking("pondering"),
                OutwardEvent::done(DoneStatus::Complete),
            ]
        );
    }

    #[tokio::test]
    async fn pending_calls_finish_as_pending_approval() {
        let run = run_of(vec![Ok(RunEvent::RunComplete {
            pending: vec![PendingApproval {
                tool_call_id: "call_0".to_string(),
                tool_name: "refund".to_string(),
                arguments: Map::new(),
            }],
        })]);

        let events = collect(run).await;
        assert_eq!(events, vec![OutwardEvent::done(DoneStatus::PendingApproval)]);
    }

    #[tokio::test]
    async fn raw_string_arguments_are_parsed_and_bad_ones_fail_the_run() {
        let good = ToolCallPart {
            tool_name: "f".to_string(),
            args: ToolArgs::Raw("{\"x\": 1}".to_string()),
            tool_call_id: "1".to_string(),
        };
        let bad = ToolCallPart {
            tool_name: "g".to_string(),
            args: ToolArgs::Raw("[1]".to_string()),
            tool_call_id: "2".to_string(),
        };
        let run = run_of(vec![
            Ok(RunEvent::ToolCallStarted { part: good }),
            Ok(RunEvent::ToolCallStarted { part: bad }),
            Ok(RunEvent::RunComplete { pending: vec![] }),
        ]);

        let events = collect(run).await;
        assert_eq!(events.len(), 3);
        assert!(matches!(
            &events[0],
            OutwardEvent::ToolCallExecuting { arguments, .. } if arguments["x"] == 1
        ));
        assert!(matches!(&events[1], OutwardEvent::Error { .. }));
        assert_eq!(events[2], OutwardEvent::done(DoneStatus::Complete));
    }

    #[tokio::test]
    async fn stream_without_completion_still_ends_with_done() {
        let run = run_of(vec![Ok(RunEvent::PartStart {
            index: 0,
            part: MessagePart::text("cut short"),
        })]);

        let events = collect(run).await;
        assert_eq!(
            events,
            vec![
                OutwardEvent::text("cut short"),
                OutwardEvent::done(DoneStatus::Complete),
            ]
        );
    }

    #[tokio::test]
    async fn events_after_completion_are_not_consumed() {
        let run = run_of(vec![
            Ok(RunEvent::RunComplete { pending: vec![] }),
            Ok(RunEvent::PartStart {
                index: 0,
                part: MessagePart::text("late"),
            }),
        ]);

        let events = collect(run).await;
        assert_eq!(events, vec![OutwardEvent::done(DoneStatus::Complete)]);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_run_times_out_with_error_and_done() {
        let run: RunStream = Box::pin(
            stream::iter(vec![Ok(RunEvent::PartStart {
                index: 0,
                part: MessagePart::text("slow"),
            })])
            .chain(stream::pending()),
        );

        let events: Vec<OutwardEvent> = translate(run, Some(Duration::from_secs(5)))
            .collect()
            .await;
        assert_eq!(
            events,
            vec![
                OutwardEvent::text("slow"),
                OutwardEvent::error("agent run timed out after 5s"),
                OutwardEvent::done(DoneStatus::Complete),
            ]
        );
    }

    #[tokio::test]
    async fn output_is_incremental() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Result<RunEvent, RunError>>();
        let run: RunStream = Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        }));
        let mut outward = translate(run, None);

        tx.send(Ok(RunEvent::PartStart {
            index: 0,
            part: MessagePart::text("first"),
        }))
        .unwrap();
        // The first event arrives while the run is still open.
        assert_eq!(outward.next().await, Some(OutwardEvent::text("first")));

        tx.send(Ok(RunEvent::RunComplete { pending: vec![] })).unwrap();
        assert_eq!(
            outward.next().await,
            Some(OutwardEvent::done(DoneStatus::Complete))
        );
        assert_eq!(outward.next().await, None);
    }
}
