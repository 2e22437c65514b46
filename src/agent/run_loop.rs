//! The turn-by-turn orchestration described in the crate's module docs:
//! assemble a request, stream it through the advisor chain, dispatch any
//! tool calls the model asks for, and recurse with their results until a
//! turn produces no further calls.

use futures::StreamExt;
use std::collections::HashSet;

use super::Agent;
use crate::error::{RunError, ToolOutcome};
use crate::llm::{Capability, Message, Request, ToolCall};
use crate::parser::StreamEvent;

struct PendingCall {
    index: usize,
    id: String,
    name: String,
    arguments: String,
}

impl Agent {
    /// Runs one full turn chain for `user_input`: the initial model call,
    /// any tool dispatches it triggers, and however many follow-up model
    /// calls those results provoke, until a turn ends with no tool calls.
    pub async fn run(&mut self, user_input: impl Into<String>) -> Result<(), RunError> {
        self.history.push(Message::user(user_input.into()));
        let snapshot = self.history.clone();

        match self.run_turns().await {
            Ok(()) => Ok(()),
            Err(e) => {
                crate::log(format!("run: fatal error, rolling back history: {e}"));
                self.ui.error(&e.to_string());
                self.history = snapshot;
                Err(e)
            }
        }
    }

    async fn run_turns(&mut self) -> Result<(), RunError> {
        let mut loops = 0usize;
        loop {
            let had_tool_calls = self.run_single_turn().await?;
            if !had_tool_calls {
                return Ok(());
            }
            loops += 1;
            if loops >= self.config.max_tool_loops {
                return Err(RunError::RecursionLimit(self.config.max_tool_loops));
            }
        }
    }

    /// Streams one model turn, dispatches any tool calls it produced, and
    /// appends the assistant + tool-result messages to history. Returns
    /// whether the turn produced tool calls (the caller recurses if so).
    async fn run_single_turn(&mut self) -> Result<bool, RunError> {
        let capability = Capability {
            supports_native_tool_calls: self.config.supports_native_tool_calls,
        };
        let request = Request {
            model: self.config.model.clone(),
            messages: self.history.clone(),
            tools: self.tools.schemas(),
            generate_config: self.config.generate_config.clone(),
            capability,
        };
        let request = self.advisors.apply_before_stream(request);

        let mut chunk_stream = self
            .engine
            .stream(request)
            .await
            .map_err(|e| RunError::Stream(e.to_string()))?;

        let mut parser = self.tool_call_advisor.new_parser(capability.supports_native_tool_calls);
        let mut text_acc = String::new();
        let mut pending: Vec<PendingCall> = Vec::new();

        while let Some(chunk_result) = chunk_stream.next().await {
            let chunk = chunk_result.map_err(|e| RunError::Stream(e.to_string()))?;
            let events = self.tool_call_advisor.translate_chunk(&mut parser, chunk);
            self.apply_events(events, &mut text_acc, &mut pending);
        }

        let trailing = self.tool_call_advisor.finish_parser(&mut parser);
        self.apply_events(trailing, &mut text_acc, &mut pending);

        let tool_calls = self.finalize_calls(pending);
        self.history
            .push(Message::assistant(text_acc, tool_calls.clone()));

        if tool_calls.is_empty() {
            return Ok(false);
        }

        for call in &tool_calls {
            let outcome = self.resolve_tool_call(call).await;
            let content = format!(
                "system-generated message\nResult of tool call ({}): {}",
                call.function.name, outcome
            );
            self.history.push(Message::tool_result(call.id.clone(), content));
        }

        Ok(true)
    }

    fn apply_events(&self, events: Vec<StreamEvent>, text_acc: &mut String, pending: &mut Vec<PendingCall>) {
        for event in events {
            match event {
                StreamEvent::Text(content) => {
                    self.ui.print_end(&content, "");
                    text_acc.push_str(&content);
                }
                StreamEvent::ToolCallStart { index, id, name } => {
                    self.ui.panel(&["tool call"], &format!("{name}(...)"), None);
                    pending.push(PendingCall {
                        index,
                        id,
                        name,
                        arguments: String::new(),
                    });
                }
                StreamEvent::ToolCallArgs { index, fragment } => {
                    if let Some(call) = pending.iter_mut().find(|c| c.index == index) {
                        call.arguments.push_str(&fragment);
                    }
                }
                StreamEvent::ToolCallEnd { .. } => {}
                StreamEvent::Done { .. } => {}
            }
        }
    }

    /// Converts accumulated `PendingCall`s into `ToolCall`s in start order,
    /// dropping any whose id repeats an earlier one in this turn.
    fn finalize_calls(&self, pending: Vec<PendingCall>) -> Vec<ToolCall> {
        let mut seen = HashSet::new();
        let mut calls = Vec::new();
        for call in pending {
            if !seen.insert(call.id.clone()) {
                crate::log(format!("run_loop: duplicate tool-call id '{}', discarding", call.id));
                continue;
            }
            calls.push(ToolCall::new(call.id, call.name, call.arguments));
        }
        calls
    }

    /// Runs the approval gate (unless `auto_approve`) and dispatches `call`,
    /// returning the outcome to report back to the model as a tool-result
    /// message. Never panics and never calls the tool on invalid JSON or an
    /// unregistered name.
    async fn resolve_tool_call(&self, call: &ToolCall) -> ToolOutcome {
        let display_text;
        let requires_approval;
        {
            let tool = match self.tools.get(&call.function.name) {
                Some(t) => t,
                None => {
                    return ToolOutcome::Unknown {
                        name: call.function.name.clone(),
                        available: self.tools.names(),
                    }
                }
            };
            let args = match call.parsed_arguments() {
                Ok(v) => v,
                Err(e) => return ToolOutcome::InvalidArguments { reason: e.to_string() },
            };
            let coerced = crate::tools::convert_data(args, &tool.parameters());
            display_text = tool.display(&coerced);
            requires_approval = tool.requires_approval();
        }

        if !self.config.auto_approve && requires_approval {
            self.ui
                .panel(&["approval", call.function.name.as_str()], &display_text, None);
            let reply = self.ui.acquire_user_input("Approve this tool call? (yes/no): ");
            if !reply.trim().eq_ignore_ascii_case("yes") {
                let reply = reply.trim().to_string();
                return ToolOutcome::ApprovalDenied {
                    reply: if reply.is_empty() { None } else { Some(reply) },
                };
            }
        }

        match self.tools.dispatch(call).await {
            Some(Ok(output)) => ToolOutcome::Success(output),
            Some(Err(e)) => ToolOutcome::Error(e),
            None => ToolOutcome::Unknown {
                name: call.function.name.clone(),
                available: self.tools.names(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentConfig};
    use crate::llm::scripted::{ScriptedEngine, ScriptedTurn};
    use crate::llm::{AgentResponse, Chunk, ChunkChoice, ChunkDelta, FinishReason, ToolCallDelta, TokenUsage};
    use crate::tools::BashTool;
    use crate::ui::RecordingUi;
    use std::sync::Arc;

    fn tool_call_chunk() -> Vec<Chunk> {
        vec![
            Chunk {
                choices: vec![ChunkChoice {
                    index: 0,
                    delta: ChunkDelta {
                        role: None,
                        content: None,
                        tool_calls: Some(vec![ToolCallDelta {
                            index: 0,
                            id: Some("call_1".to_string()),
                            name: Some("bash".to_string()),
                            arguments: None,
                        }]),
                    },
                    finish_reason: None,
                }],
                usage: None,
            },
            Chunk {
                choices: vec![ChunkChoice {
                    index: 0,
                    delta: ChunkDelta {
                        role: None,
                        content: None,
                        tool_calls: Some(vec![ToolCallDelta {
                            index: 0,
                            id: None,
                            name: None,
                            arguments: Some("{\"command\":\"echo hi\"}".to_string()),
                        }]),
                    },
                    finish_reason: Some("tool_calls".to_string()),
                }],
                usage: None,
            },
        ]
    }

    #[tokio::test]
    async fn plain_text_turn_produces_no_tool_calls() {
        let engine = Arc::new(ScriptedEngine::new(vec![ScriptedTurn::text("hello there")]));
        let ui = Arc::new(RecordingUi::new());
        let mut agent = Agent::builder(engine, ui.clone())
            .with_config(AgentConfig {
                auto_approve: true,
                ..Default::default()
            })
            .build();

        agent.run("hi").await.unwrap();

        assert_eq!(agent.history().len(), 2);
        assert_eq!(agent.history()[1].content.as_deref(), Some("hello there"));
    }

    #[tokio::test]
    async fn auto_approved_tool_call_dispatches_and_recurses() {
        let engine = Arc::new(ScriptedEngine::new(vec![
            ScriptedTurn {
                chunks: tool_call_chunk(),
                response: AgentResponse {
                    content: String::new(),
                    finish_reason: FinishReason::ToolCalls,
                    tool_calls: vec![],
                    usage: TokenUsage::default(),
                },
            },
            ScriptedTurn::text("done"),
        ]));
        let ui = Arc::new(RecordingUi::new());
        let mut agent = Agent::builder(engine, ui)
            .with_tool(Box::new(BashTool::new()))
            .with_config(AgentConfig {
                auto_approve: true,
                ..Default::default()
            })
            .build();

        agent.run("run echo").await.unwrap();

        let tool_message = agent
            .history()
            .iter()
            .find(|m| m.role == crate::llm::Role::Tool)
            .expect("a tool-result message");
        assert!(tool_message.content.as_ref().unwrap().contains("hi"));
    }

    #[tokio::test]
    async fn denied_approval_records_refusal_without_running_the_tool() {
        let engine = Arc::new(ScriptedEngine::new(vec![ScriptedTurn {
            chunks: tool_call_chunk(),
            response: AgentResponse {
                content: String::new(),
                finish_reason: FinishReason::ToolCalls,
                tool_calls: vec![],
                usage: TokenUsage::default(),
            },
        }]));
        let ui = Arc::new(RecordingUi::with_replies(vec!["no"]));
        let mut agent = Agent::builder(engine, ui)
            .with_tool(Box::new(BashTool::new()))
            .build();

        let err = agent.run("run echo").await;
        assert!(err.is_err(), "the scripted engine has no second turn, so the follow-up stream call fails");
        assert_eq!(agent.history().len(), 1, "history rolls back to just the user message");
    }

    #[tokio::test]
    async fn unknown_tool_name_reports_available_tools() {
        let mut chunks = tool_call_chunk();
        if let Some(delta) = chunks[0].choices[0].delta.tool_calls.as_mut().and_then(|v| v.first_mut()) {
            delta.name = Some("does_not_exist".to_string());
        }
        let engine = Arc::new(ScriptedEngine::new(vec![
            ScriptedTurn {
                chunks,
                response: AgentResponse {
                    content: String::new(),
                    finish_reason: FinishReason::ToolCalls,
                    tool_calls: vec![],
                    usage: TokenUsage::default(),
                },
            },
            ScriptedTurn::text("ok"),
        ]));
        let ui = Arc::new(RecordingUi::new());
        let mut agent = Agent::builder(engine, ui)
            .with_tool(Box::new(BashTool::new()))
            .with_config(AgentConfig {
                auto_approve: true,
                ..Default::default()
            })
            .build();

        agent.run("do the thing").await.unwrap();

        let tool_message = agent
            .history()
            .iter()
            .find(|m| m.role == crate::llm::Role::Tool)
            .expect("a tool-result message");
        assert!(tool_message.content.as_ref().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn recursion_limit_is_enforced_and_rolls_back_history() {
        let turns: Vec<ScriptedTurn> = (0..20)
            .map(|_| ScriptedTurn {
                chunks: tool_call_chunk(),
                response: AgentResponse {
                    content: String::new(),
                    finish_reason: FinishReason::ToolCalls,
                    tool_calls: vec![],
                    usage: TokenUsage::default(),
                },
            })
            .collect();
        let engine = Arc::new(ScriptedEngine::new(turns));
        let ui = Arc::new(RecordingUi::new());
        let mut agent = Agent::builder(engine, ui)
            .with_tool(Box::new(BashTool::new()))
            .with_config(AgentConfig {
                auto_approve: true,
                max_tool_loops: 2,
                ..Default::default()
            })
            .build();

        let result = agent.run("loop forever").await;
        assert!(matches!(result, Err(RunError::RecursionLimit(2))));
        assert_eq!(agent.history().len(), 1, "history rolls back to just the user message");
    }
}
