//! Parser backend for providers with no native tool-calling support: tool
//! calls are emulated as XML-ish tags in the text stream and reconstructed
//! here character by character.
//!
//! The state machine only ever looks at the accumulated tag buffer, never
//! at which provider chunk a byte arrived in, so a tag split across
//! arbitrarily many chunk boundaries parses identically to one delivered
//! whole.

use crate::parser::event::StreamEvent;

#[derive(Debug, Clone)]
pub struct TagSet {
    pub tool_call_start: String,
    pub tool_call_end: String,
    pub tool_name_start: String,
    pub tool_name_end: String,
    pub tool_params_start: String,
    pub tool_params_end: String,
}

impl Default for TagSet {
    fn default() -> Self {
        Self {
            tool_call_start: "<tool_call>".to_string(),
            tool_call_end: "</tool_call>".to_string(),
            tool_name_start: "<tool_name>".to_string(),
            tool_name_end: "</tool_name>".to_string(),
            tool_params_start: "<tool_params>".to_string(),
            tool_params_end: "</tool_params>".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    PotentialTag,
    ToolName,
    Params,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagContext {
    ToolCall,
    ToolName,
    ToolAfterName,
    Params,
    ToolAfterParams,
}

struct PendingCall {
    index: usize,
    id: String,
    name_buffer: String,
    name: Option<String>,
    args_buffer: String,
}

/// Stateful char-by-char tag decoder. One instance per turn.
pub struct TagParser {
    tags: TagSet,
    state: State,
    tag_buffer: String,
    tag_context: Option<TagContext>,
    tool_call: Option<PendingCall>,
    text_buffer: String,
    next_index: usize,
    next_id: usize,
}

impl TagParser {
    pub fn new(tags: TagSet) -> Self {
        Self {
            tags,
            state: State::Text,
            tag_buffer: String::new(),
            tag_context: None,
            tool_call: None,
            text_buffer: String::new(),
            next_index: 0,
            next_id: 0,
        }
    }

    /// Feed a fragment of assistant text (already extracted from the
    /// provider chunk's `content` delta).
    pub fn feed_text(&mut self, text: &str) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        for ch in text.chars() {
            self.process_char(ch, &mut events);
        }
        events
    }

    fn candidates(&self) -> Vec<&str> {
        match self.tag_context {
            None => vec![self.tags.tool_call_start.as_str()],
            Some(TagContext::ToolCall) => {
                vec![self.tags.tool_name_start.as_str(), self.tags.tool_call_end.as_str()]
            }
            Some(TagContext::ToolName) => vec![self.tags.tool_name_end.as_str()],
            Some(TagContext::ToolAfterName) => {
                vec![self.tags.tool_params_start.as_str(), self.tags.tool_call_end.as_str()]
            }
            Some(TagContext::Params) => vec![self.tags.tool_params_end.as_str()],
            Some(TagContext::ToolAfterParams) => vec![self.tags.tool_call_end.as_str()],
        }
    }

    fn process_char(&mut self, ch: char, events: &mut Vec<StreamEvent>) {
        match self.state {
            State::Text => self.handle_text(ch, events),
            State::PotentialTag => self.handle_potential_tag(ch, events),
            State::ToolName => self.handle_tool_name(ch),
            State::Params => self.handle_params(ch, events),
        }
    }

    fn handle_text(&mut self, ch: char, events: &mut Vec<StreamEvent>) {
        let start_first = self.tags.tool_call_start.chars().next().unwrap_or('\0');
        if ch == start_first {
            self.state = State::PotentialTag;
            self.tag_buffer.clear();
            self.tag_buffer.push(ch);
        } else if self.tool_call.is_some() {
            // inside a tool call but outside any recognized sub-tag: ignore stray text
        } else {
            self.text_buffer.push(ch);
            events.push(StreamEvent::Text(self.drain_text_buffer()));
        }
    }

    fn drain_text_buffer(&mut self) -> String {
        std::mem::take(&mut self.text_buffer)
    }

    fn handle_potential_tag(&mut self, ch: char, events: &mut Vec<StreamEvent>) {
        self.tag_buffer.push(ch);
        let candidates = self.candidates();

        if !candidates.iter().any(|c| c.starts_with(self.tag_buffer.as_str())) {
            // not a valid prefix of anything: fall back to plain text
            let leftover = std::mem::take(&mut self.tag_buffer);
            self.state = State::Text;
            self.tag_context = None;
            if self.tool_call.is_none() {
                self.text_buffer.push_str(&leftover);
            }
            return;
        }

        if let Some(matched) = candidates.iter().find(|c| **c == self.tag_buffer).copied() {
            let matched = matched.to_string();
            if matched == self.tags.tool_call_start && !self.text_buffer.is_empty() {
                events.push(StreamEvent::Text(self.drain_text_buffer()));
            }
            self.handle_matched_tag(&matched, events);
        }
    }

    fn handle_matched_tag(&mut self, matched: &str, events: &mut Vec<StreamEvent>) {
        if *matched == self.tags.tool_call_start {
            let index = self.next_index;
            self.next_index += 1;
            let id = format!("tagcall-{}", self.next_id);
            self.next_id += 1;
            self.tool_call = Some(PendingCall {
                index,
                id,
                name_buffer: String::new(),
                name: None,
                args_buffer: String::new(),
            });
            self.tag_context = Some(TagContext::ToolCall);
            self.state = State::Text;
        } else if *matched == self.tags.tool_name_start {
            self.tag_context = Some(TagContext::ToolName);
            self.state = State::ToolName;
            if let Some(call) = &mut self.tool_call {
                call.name_buffer.clear();
            }
        } else if *matched == self.tags.tool_name_end {
            if let Some(call) = &mut self.tool_call {
                let name = call.name_buffer.trim().to_string();
                call.name = Some(name.clone());
                events.push(StreamEvent::ToolCallStart {
                    index: call.index,
                    id: call.id.clone(),
                    name,
                });
            }
            self.tag_context = Some(TagContext::ToolAfterName);
            self.state = State::Text;
        } else if *matched == self.tags.tool_params_start {
            self.tag_context = Some(TagContext::Params);
            self.state = State::Params;
            if let Some(call) = &mut self.tool_call {
                call.args_buffer.clear();
            }
        } else if *matched == self.tags.tool_params_end {
            self.tag_context = Some(TagContext::ToolAfterParams);
            self.state = State::Text;
        } else if *matched == self.tags.tool_call_end {
            if let Some(call) = self.tool_call.take() {
                events.push(StreamEvent::ToolCallEnd { index: call.index });
            }
            self.tag_context = None;
            self.state = State::Text;
        }
        self.tag_buffer.clear();
    }

    fn handle_tool_name(&mut self, ch: char) {
        let end_first = self.tags.tool_name_end.chars().next().unwrap_or('\0');
        if ch == end_first {
            self.tag_buffer.clear();
            self.tag_buffer.push(ch);
            self.tag_context = Some(TagContext::ToolName);
            self.state = State::PotentialTag;
        } else if let Some(call) = &mut self.tool_call {
            call.name_buffer.push(ch);
        }
    }

    fn handle_params(&mut self, ch: char, events: &mut Vec<StreamEvent>) {
        let end_first = self.tags.tool_params_end.chars().next().unwrap_or('\0');
        if ch == end_first {
            self.tag_buffer.clear();
            self.tag_buffer.push(ch);
            self.tag_context = Some(TagContext::Params);
            self.state = State::PotentialTag;
        } else if let Some(call) = &mut self.tool_call {
            call.args_buffer.push(ch);
            events.push(StreamEvent::ToolCallArgs {
                index: call.index,
                fragment: ch.to_string(),
            });
        }
    }

    /// Drain whatever text or argument fragment was buffered at the moment
    /// the underlying stream ended, without a terminating tag ever showing
    /// up. Matches the reference behavior: an in-flight tag prefix is
    /// flushed as plain text rather than silently dropped.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if self.state == State::PotentialTag {
            let leftover = std::mem::take(&mut self.tag_buffer);
            if self.tool_call.is_some() {
                if self.tag_context == Some(TagContext::Params) {
                    if let Some(call) = &mut self.tool_call {
                        call.args_buffer.push_str(&leftover);
                    }
                    events.push(StreamEvent::ToolCallArgs {
                        index: self.tool_call.as_ref().unwrap().index,
                        fragment: leftover,
                    });
                }
            } else {
                self.text_buffer.push_str(&leftover);
            }
        }

        if !self.text_buffer.is_empty() {
            events.push(StreamEvent::Text(self.drain_text_buffer()));
        } else if self.state == State::ToolName {
            if let Some(call) = self.tool_call.take() {
                events.push(StreamEvent::ToolCallEnd { index: call.index });
            }
        } else if self.state == State::Params {
            if let Some(call) = self.tool_call.take() {
                events.push(StreamEvent::ToolCallEnd { index: call.index });
            }
        }

        events
    }
}

/// Extracts a tool call's JSON arguments once its fragments have all been
/// collected by the run loop. Matches the reference: invalid JSON yields an
/// empty object rather than aborting the turn.
pub fn finalize_arguments(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "{}".to_string();
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(_) => trimmed.to_string(),
        Err(_) => "{}".to_string(),
    }
}

/// Non-streaming counterpart: scans a complete message body for `<tool_call>`
/// blocks and returns the tool calls found plus the text with those blocks
/// stripped out. Used for the `call()` path, where the full response body
/// is available up front rather than arriving char by char.
pub fn extract_tool_calls(text: &str, tags: &TagSet, next_id: &mut usize) -> (String, Vec<crate::llm::ToolCall>) {
    let mut calls = Vec::new();
    let mut remainder = String::new();
    let mut cursor = 0usize;

    loop {
        let Some(start_rel) = text[cursor..].find(&tags.tool_call_start) else {
            remainder.push_str(&text[cursor..]);
            break;
        };
        let start = cursor + start_rel;
        remainder.push_str(&text[cursor..start]);

        let block_start = start + tags.tool_call_start.len();
        let Some(end_rel) = text[block_start..].find(&tags.tool_call_end) else {
            remainder.push_str(&text[start..]);
            break;
        };
        let end = block_start + end_rel;
        let block = &text[block_start..end];

        let name = extract_between(block, &tags.tool_name_start, &tags.tool_name_end);
        let params = extract_between(block, &tags.tool_params_start, &tags.tool_params_end);

        if let Some(name) = name {
            let arguments = if params.as_deref().unwrap_or("").is_empty() {
                "{}".to_string()
            } else {
                finalize_arguments(&params.unwrap())
            };
            let id = format!("tagcall-{}", *next_id);
            *next_id += 1;
            calls.push(crate::llm::ToolCall::new(id, name, arguments));
        }

        cursor = end + tags.tool_call_end.len();
    }

    (remainder, calls)
}

fn extract_between(text: &str, start_tag: &str, end_tag: &str) -> Option<String> {
    let start = text.find(start_tag)?;
    let after_start = start + start_tag.len();
    let end = text[after_start..].find(end_tag)? + after_start;
    Some(text[after_start..end].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str) -> Vec<StreamEvent> {
        let mut parser = TagParser::new(TagSet::default());
        let mut events = parser.feed_text(text);
        events.extend(parser.finish());
        events
    }

    #[test]
    fn plain_text_passes_through() {
        let events = run("hi");
        assert_eq!(
            events,
            vec![StreamEvent::Text("h".into()), StreamEvent::Text("i".into())]
        );
    }

    #[test]
    fn full_tool_call_emits_start_args_end() {
        let events = run("<tool_call><tool_name>bash</tool_name><tool_params>{\"cmd\":\"ls\"}</tool_params></tool_call>");
        assert!(events.iter().any(|e| matches!(e, StreamEvent::ToolCallStart { name, .. } if name == "bash")));
        assert!(events.iter().any(|e| matches!(e, StreamEvent::ToolCallEnd { .. })));
        let arg_text: String = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::ToolCallArgs { fragment, .. } => Some(fragment.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(arg_text, "{\"cmd\":\"ls\"}");
    }

    #[test]
    fn tag_split_across_feed_calls_still_parses() {
        let mut parser = TagParser::new(TagSet::default());
        let mut events = Vec::new();
        events.extend(parser.feed_text("<tool_c"));
        events.extend(parser.feed_text("all><tool_name>bash</tool_name>"));
        events.extend(parser.feed_text("<tool_params>{}</tool_params></tool_call>"));
        events.extend(parser.finish());
        assert!(events.iter().any(|e| matches!(e, StreamEvent::ToolCallStart { name, .. } if name == "bash")));
    }

    #[test]
    fn malformed_angle_bracket_falls_back_to_text() {
        let events = run("<not a tag> plain");
        let text: String = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Text(t) => Some(t.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "<not a tag> plain");
    }
}
