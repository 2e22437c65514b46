//! Parser backend for providers that emit structured `tool_calls` deltas
//! natively (OpenAI-style function calling, Anthropic tool_use blocks once
//! normalized by the engine). Tracks id/name/argument accumulation per
//! `index` and re-emits as `StreamEvent`s; no text scanning is involved.

use std::collections::BTreeMap;

use crate::llm::{Chunk, ToolCallDelta};
use crate::parser::event::{FinishReasonKind, StreamEvent};

#[derive(Default)]
struct PendingCall {
    id: Option<String>,
    name: Option<String>,
    started: bool,
    closed: bool,
}

/// Stateful adapter from a sequence of provider `Chunk`s to `StreamEvent`s.
/// One instance per turn. Tool calls arrive serially even across distinct
/// `index` values, so the parser tracks a single active index and closes it
/// the moment a different index shows up, on `finish_reason`, or at stream
/// end, whichever comes first.
#[derive(Default)]
pub struct NativeParser {
    pending: BTreeMap<usize, PendingCall>,
    active_index: Option<usize>,
}

impl NativeParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning the events it produces in order.
    pub fn feed(&mut self, chunk: Chunk) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        for choice in chunk.choices {
            if let Some(content) = choice.delta.content {
                if !content.is_empty() {
                    events.push(StreamEvent::Text(content));
                }
            }

            if let Some(deltas) = choice.delta.tool_calls {
                for delta in deltas {
                    events.extend(self.handle_tool_delta(delta));
                }
            }

            if let Some(reason) = choice.finish_reason {
                if let Some(index) = self.active_index.take() {
                    events.extend(self.close(index));
                }
                events.push(StreamEvent::Done {
                    finish_reason: map_finish_reason(&reason),
                });
            }
        }

        events
    }

    fn close(&mut self, index: usize) -> Option<StreamEvent> {
        let call = self.pending.get_mut(&index)?;
        if call.started && !call.closed {
            call.closed = true;
            return Some(StreamEvent::ToolCallEnd { index });
        }
        None
    }

    fn handle_tool_delta(&mut self, delta: ToolCallDelta) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(active) = self.active_index {
            if active != delta.index {
                events.extend(self.close(active));
            }
        }
        self.active_index = Some(delta.index);

        let entry = self.pending.entry(delta.index).or_default();

        if let Some(id) = delta.id {
            entry.id = Some(id);
        }
        if let Some(name) = delta.name {
            entry.name = Some(name);
        }

        if !entry.started {
            if let (Some(id), Some(name)) = (entry.id.clone(), entry.name.clone()) {
                entry.started = true;
                events.push(StreamEvent::ToolCallStart {
                    index: delta.index,
                    id,
                    name,
                });
            }
        }

        if let Some(fragment) = delta.arguments {
            if entry.started && !fragment.is_empty() {
                events.push(StreamEvent::ToolCallArgs {
                    index: delta.index,
                    fragment,
                });
            }
        }

        events
    }

    /// Call once the underlying stream has ended, closing any tool call that
    /// never saw an explicit `finish_reason` or index change.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if let Some(index) = self.active_index.take() {
            events.extend(self.close(index));
        }
        self.pending.clear();
        events
    }
}

fn map_finish_reason(reason: &str) -> FinishReasonKind {
    match reason {
        "stop" => FinishReasonKind::Stop,
        "length" => FinishReasonKind::Length,
        "tool_calls" => FinishReasonKind::ToolCalls,
        "content_filter" => FinishReasonKind::ContentFilter,
        _ => FinishReasonKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChunkChoice, ChunkDelta};

    fn chunk_with_tool_delta(delta: ToolCallDelta) -> Chunk {
        Chunk {
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    role: None,
                    content: None,
                    tool_calls: Some(vec![delta]),
                },
                finish_reason: None,
            }],
            usage: None,
        }
    }

    #[test]
    fn text_passes_through_untouched() {
        let mut parser = NativeParser::new();
        let chunk = Chunk {
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    role: None,
                    content: Some("hello".to_string()),
                    tool_calls: None,
                },
                finish_reason: None,
            }],
            usage: None,
        };
        assert_eq!(parser.feed(chunk), vec![StreamEvent::Text("hello".to_string())]);
    }

    #[test]
    fn tool_call_start_waits_for_both_id_and_name() {
        let mut parser = NativeParser::new();
        let events = parser.feed(chunk_with_tool_delta(ToolCallDelta {
            index: 0,
            id: Some("call_1".to_string()),
            name: None,
            arguments: None,
        }));
        assert!(events.is_empty());

        let events = parser.feed(chunk_with_tool_delta(ToolCallDelta {
            index: 0,
            id: None,
            name: Some("search".to_string()),
            arguments: None,
        }));
        assert_eq!(
            events,
            vec![StreamEvent::ToolCallStart {
                index: 0,
                id: "call_1".to_string(),
                name: "search".to_string(),
            }]
        );
    }

    #[test]
    fn unfinished_tool_call_is_closed_at_stream_end() {
        let mut parser = NativeParser::new();
        parser.feed(chunk_with_tool_delta(ToolCallDelta {
            index: 2,
            id: Some("call_2".to_string()),
            name: Some("bash".to_string()),
            arguments: Some("{}".to_string()),
        }));
        assert_eq!(parser.finish(), vec![StreamEvent::ToolCallEnd { index: 2 }]);
    }

    #[test]
    fn finish_reason_closes_the_active_call_before_done() {
        let mut parser = NativeParser::new();
        parser.feed(chunk_with_tool_delta(ToolCallDelta {
            index: 0,
            id: Some("call_1".to_string()),
            name: Some("bash".to_string()),
            arguments: Some("{}".to_string()),
        }));

        let chunk = Chunk {
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta::default(),
                finish_reason: Some("tool_calls".to_string()),
            }],
            usage: None,
        };
        assert_eq!(
            parser.feed(chunk),
            vec![
                StreamEvent::ToolCallEnd { index: 0 },
                StreamEvent::Done {
                    finish_reason: FinishReasonKind::ToolCalls,
                },
            ]
        );
        assert!(parser.finish().is_empty(), "already closed, finish() must not double-close");
    }

    #[test]
    fn index_change_closes_the_previous_call() {
        let mut parser = NativeParser::new();
        parser.feed(chunk_with_tool_delta(ToolCallDelta {
            index: 0,
            id: Some("call_1".to_string()),
            name: Some("search".to_string()),
            arguments: None,
        }));

        let events = parser.feed(chunk_with_tool_delta(ToolCallDelta {
            index: 1,
            id: Some("call_2".to_string()),
            name: Some("bash".to_string()),
            arguments: None,
        }));
        assert_eq!(
            events,
            vec![
                StreamEvent::ToolCallEnd { index: 0 },
                StreamEvent::ToolCallStart {
                    index: 1,
                    id: "call_2".to_string(),
                    name: "bash".to_string(),
                },
            ]
        );
    }
}
