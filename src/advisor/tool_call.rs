//! The one advisor every agent carries: when the target provider has no
//! native tool-calling support, it injects a system prompt describing the
//! tag syntax and bridges the resulting text stream back into structured
//! tool calls. When the provider is native, every hook here is a no-op
//! except the defensive text-tag scan in `after_call` (harmless if the
//! model never emits tags).

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::advisor::Advisor;
use crate::agent::prompt::render_tool_call_system_prompt;
use crate::llm::{AgentResponse, Message, Request, Role};
use crate::parser::tag::{extract_tool_calls, TagParser};
use crate::parser::{StreamEvent, TagSet};

pub struct ToolCallAdvisor {
    tags: TagSet,
    next_id: AtomicUsize,
}

impl Default for ToolCallAdvisor {
    fn default() -> Self {
        Self {
            tags: TagSet::default(),
            next_id: AtomicUsize::new(0),
        }
    }
}

impl ToolCallAdvisor {
    pub fn new(tags: TagSet) -> Self {
        Self {
            tags,
            next_id: AtomicUsize::new(0),
        }
    }

    fn convert_messages(&self, mut request: Request) -> Request {
        if request.tools.is_empty() {
            return request;
        }

        let scaffold = render_tool_call_system_prompt(&request.tools, &self.tags);

        match request.messages.first_mut() {
            Some(msg) if msg.role == Role::System => {
                let existing = msg.content.clone().unwrap_or_default();
                msg.content = Some(format!("{}\n\n{}", existing, scaffold));
            }
            _ => {
                request.messages.insert(0, Message::system(scaffold));
            }
        }

        for msg in request.messages.iter_mut() {
            if msg.role == Role::Tool {
                msg.role = Role::User;
            }
        }

        request
    }

    /// Turns a raw engine chunk stream into `StreamEvent`s, picking the
    /// native or tag-mode parser based on the request's capability.
    pub fn translate_chunk(&self, parser: &mut TagOrNativeParser, chunk: crate::llm::Chunk) -> Vec<StreamEvent> {
        match parser {
            TagOrNativeParser::Native(p) => p.feed(chunk),
            TagOrNativeParser::Tag(p) => {
                let mut events = Vec::new();
                for choice in chunk.choices {
                    if let Some(content) = choice.delta.content {
                        events.extend(p.feed_text(&content));
                    }
                    if let Some(reason) = choice.finish_reason {
                        events.push(StreamEvent::Done {
                            finish_reason: map_finish_reason(&reason),
                        });
                    }
                }
                events
            }
        }
    }

    pub fn new_parser(&self, supports_native: bool) -> TagOrNativeParser {
        if supports_native {
            TagOrNativeParser::Native(crate::parser::NativeParser::new())
        } else {
            TagOrNativeParser::Tag(TagParser::new(self.tags.clone()))
        }
    }

    pub fn finish_parser(&self, parser: &mut TagOrNativeParser) -> Vec<StreamEvent> {
        match parser {
            TagOrNativeParser::Native(p) => p.finish(),
            TagOrNativeParser::Tag(p) => p.finish(),
        }
    }
}

fn map_finish_reason(reason: &str) -> crate::parser::FinishReasonKind {
    use crate::parser::FinishReasonKind;
    match reason {
        "stop" => FinishReasonKind::Stop,
        "length" => FinishReasonKind::Length,
        "tool_calls" => FinishReasonKind::ToolCalls,
        "content_filter" => FinishReasonKind::ContentFilter,
        _ => FinishReasonKind::Other,
    }
}

pub enum TagOrNativeParser {
    Native(crate::parser::NativeParser),
    Tag(TagParser),
}

impl Advisor for ToolCallAdvisor {
    fn is_builtin(&self) -> bool {
        true
    }

    fn priority(&self) -> i32 {
        10
    }

    fn before_call(&self, request: Request) -> Request {
        if request.capability.supports_native_tool_calls {
            return request;
        }
        self.convert_messages(request)
    }

    fn before_stream(&self, request: Request) -> Request {
        if request.capability.supports_native_tool_calls {
            return request;
        }
        self.convert_messages(request)
    }

    fn after_call(&self, request: &Request, mut response: AgentResponse) -> AgentResponse {
        if !response.tool_calls.is_empty() {
            return response;
        }
        if request.capability.supports_native_tool_calls {
            return response;
        }
        let mut counter = self.next_id.load(Ordering::SeqCst);
        let (remainder, calls) = extract_tool_calls(&response.content, &self.tags, &mut counter);
        self.next_id.store(counter, Ordering::SeqCst);
        if !calls.is_empty() {
            response.content = remainder;
            response.tool_calls = calls;
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Capability, GenerateConfig, ToolSchema};

    fn tools() -> Vec<ToolSchema> {
        vec![ToolSchema {
            name: "search".to_string(),
            description: "search the web".to_string(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }]
    }

    fn request(native: bool) -> Request {
        Request {
            model: "test".to_string(),
            messages: vec![Message::user("hi")],
            tools: tools(),
            generate_config: GenerateConfig::default(),
            capability: Capability {
                supports_native_tool_calls: native,
            },
        }
    }

    #[test]
    fn injects_system_prompt_when_non_native() {
        let advisor = ToolCallAdvisor::default();
        let out = advisor.before_call(request(false));
        assert_eq!(out.messages.len(), 2);
        assert_eq!(out.messages[0].role, Role::System);
        assert!(out.messages[0].content.as_ref().unwrap().contains("search"));
    }

    #[test]
    fn leaves_request_untouched_when_native() {
        let advisor = ToolCallAdvisor::default();
        let out = advisor.before_call(request(true));
        assert_eq!(out.messages.len(), 1);
    }

    #[test]
    fn after_call_extracts_tag_tool_calls_from_text() {
        let advisor = ToolCallAdvisor::default();
        let req = request(false);
        let resp = AgentResponse {
            content: "<tool_call><tool_name>search</tool_name><tool_params>{\"q\":\"rust\"}</tool_params></tool_call>".to_string(),
            finish_reason: crate::llm::FinishReason::Stop,
            tool_calls: vec![],
            usage: Default::default(),
        };
        let out = advisor.after_call(&req, resp);
        assert_eq!(out.tool_calls.len(), 1);
        assert_eq!(out.tool_calls[0].function.name, "search");
        assert_eq!(out.content, "");
    }

    #[test]
    fn tool_messages_become_user_messages_when_non_native() {
        let advisor = ToolCallAdvisor::default();
        let mut req = request(false);
        req.messages.push(Message::tool_result("call_1", "42"));
        let out = advisor.before_call(req);
        assert!(out.messages.iter().all(|m| m.role != Role::Tool));
    }
}
