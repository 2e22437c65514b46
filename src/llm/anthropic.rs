//! Anthropic Messages API engine implementation using reqwest + SSE streaming.
//!
//! Tool calls arrive as `content_block_start`/`content_block_delta`/
//! `content_block_stop` triples (`tool_use` block + `input_json_delta`
//! fragments); they are translated into the same `ToolCallDelta` vocabulary
//! `OpenAiEngine` produces so the rest of the crate never sees the
//! difference.

use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use super::engine::{ChunkStream, EngineError, LLMEngine};
use super::types::{
    AgentResponse, Chunk, ChunkChoice, ChunkDelta, FinishReason, Request, Role,
    ToolCall, ToolCallDelta, ToolCallFunction, TokenUsage,
};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone)]
pub struct AnthropicEngine {
    client: reqwest::Client,
    api_key: String,
}

impl AnthropicEngine {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    fn build_body(&self, request: &Request, stream: bool) -> CreateMessageRequest {
        let mut system: Option<String> = None;
        let mut messages = Vec::new();

        for msg in &request.messages {
            match msg.role {
                Role::System => {
                    if system.is_none() {
                        system = msg.content.clone();
                    }
                }
                Role::User => {
                    messages.push(AnthropicMessage {
                        role: "user".to_string(),
                        content: AnthropicContent::Text(msg.content.clone().unwrap_or_default()),
                    });
                }
                Role::Assistant => {
                    let mut blocks = Vec::new();
                    if let Some(text) = &msg.content {
                        if !text.is_empty() {
                            blocks.push(AnthropicContentBlock::Text { text: text.clone() });
                        }
                    }
                    if let Some(calls) = &msg.tool_calls {
                        for call in calls {
                            let input = call
                                .parsed_arguments()
                                .unwrap_or_else(|_| serde_json::json!({}));
                            blocks.push(AnthropicContentBlock::ToolUse {
                                id: call.id.clone(),
                                name: call.function.name.clone(),
                                input,
                            });
                        }
                    }
                    if !blocks.is_empty() {
                        messages.push(AnthropicMessage {
                            role: "assistant".to_string(),
                            content: AnthropicContent::Blocks(blocks),
                        });
                    }
                }
                Role::Tool => {
                    if let Some(id) = &msg.tool_call_id {
                        messages.push(AnthropicMessage {
                            role: "user".to_string(),
                            content: AnthropicContent::Blocks(vec![
                                AnthropicContentBlock::ToolResult {
                                    tool_use_id: id.clone(),
                                    content: msg.content.clone().unwrap_or_default(),
                                },
                            ]),
                        });
                    }
                }
            }
        }

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|t| AnthropicTool {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        input_schema: t.parameters.clone(),
                    })
                    .collect(),
            )
        };

        CreateMessageRequest {
            model: request.model.clone(),
            max_tokens: request.generate_config.max_tokens,
            messages,
            system,
            temperature: request.generate_config.temperature,
            stream,
            tools,
        }
    }
}

fn parse_finish_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("end_turn") => FinishReason::Stop,
        Some("stop_sequence") => FinishReason::Stop,
        Some("max_tokens") => FinishReason::Length,
        Some("tool_use") => FinishReason::ToolCalls,
        Some(other) => FinishReason::Other(other.to_string()),
        None => FinishReason::Stop,
    }
}

#[async_trait::async_trait]
impl LLMEngine for AnthropicEngine {
    async fn call(&self, request: Request) -> Result<AgentResponse, EngineError> {
        let body = self.build_body(&request, false);
        let response = self
            .client
            .post(format!("{}/messages", ANTHROPIC_API_BASE))
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(EngineError::Api(format!("HTTP {}: {}", status, text)));
        }

        let parsed: CreateMessageResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Api(format!("failed to parse response: {}", e)))?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for block in parsed.content {
            match block {
                AnthropicContentBlock::Text { text } => content.push_str(&text),
                AnthropicContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall {
                        id,
                        call_type: "function".to_string(),
                        function: ToolCallFunction {
                            name,
                            arguments: serde_json::to_string(&input).unwrap_or_default(),
                        },
                    });
                }
                AnthropicContentBlock::ToolResult { .. } => {}
            }
        }

        Ok(AgentResponse {
            content,
            finish_reason: parse_finish_reason(parsed.stop_reason.as_deref()),
            tool_calls,
            usage: TokenUsage {
                input_tokens: parsed.usage.input_tokens,
                output_tokens: parsed.usage.output_tokens,
            },
        })
    }

    async fn stream(&self, request: Request) -> Result<ChunkStream, EngineError> {
        let body = self.build_body(&request, true);
        let response = self
            .client
            .post(format!("{}/messages", ANTHROPIC_API_BASE))
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(EngineError::Api(format!("HTTP {}: {}", status, text)));
        }

        let event_stream = response.bytes_stream().eventsource();

        let stream = async_stream::stream! {
            futures::pin_mut!(event_stream);
            let mut current_tool: Option<(usize, String, String)> = None;
            let mut next_index: usize = 0;
            let mut input_tokens: u32 = 0;

            while let Some(event_result) = event_stream.next().await {
                let event = match event_result {
                    Ok(e) => e,
                    Err(e) => {
                        yield Err(EngineError::Api(format!("sse error: {}", e)));
                        return;
                    }
                };

                if event.event == "message_stop" {
                    return;
                }
                if event.data.trim().is_empty() {
                    continue;
                }

                match event.event.as_str() {
                    "message_start" => {
                        if let Ok(start) = serde_json::from_str::<MessageStart>(&event.data) {
                            input_tokens = start.message.usage.input_tokens;
                        }
                    }
                    "content_block_start" => {
                        if let Ok(start) = serde_json::from_str::<ContentBlockStart>(&event.data) {
                            if let AnthropicContentBlock::ToolUse { id, name, .. } = start.content_block {
                                let index = next_index;
                                next_index += 1;
                                current_tool = Some((index, id.clone(), name.clone()));
                                yield Ok(Chunk {
                                    choices: vec![ChunkChoice {
                                        index: 0,
                                        delta: ChunkDelta {
                                            role: None,
                                            content: None,
                                            tool_calls: Some(vec![ToolCallDelta {
                                                index,
                                                id: Some(id),
                                                name: Some(name),
                                                arguments: None,
                                            }]),
                                        },
                                        finish_reason: None,
                                    }],
                                    usage: None,
                                });
                            }
                        }
                    }
                    "content_block_delta" => {
                        if let Ok(delta) = serde_json::from_str::<ContentBlockDelta>(&event.data) {
                            match delta.delta {
                                ContentDelta::TextDelta { text } => {
                                    yield Ok(Chunk {
                                        choices: vec![ChunkChoice {
                                            index: 0,
                                            delta: ChunkDelta {
                                                role: None,
                                                content: Some(text),
                                                tool_calls: None,
                                            },
                                            finish_reason: None,
                                        }],
                                        usage: None,
                                    });
                                }
                                ContentDelta::InputJsonDelta { partial_json } => {
                                    if let Some((index, _, _)) = &current_tool {
                                        yield Ok(Chunk {
                                            choices: vec![ChunkChoice {
                                                index: 0,
                                                delta: ChunkDelta {
                                                    role: None,
                                                    content: None,
                                                    tool_calls: Some(vec![ToolCallDelta {
                                                        index: *index,
                                                        id: None,
                                                        name: None,
                                                        arguments: Some(partial_json),
                                                    }]),
                                                },
                                                finish_reason: None,
                                            }],
                                            usage: None,
                                        });
                                    }
                                }
                                ContentDelta::ThinkingDelta { .. } => {}
                            }
                        }
                    }
                    "content_block_stop" => {
                        current_tool = None;
                    }
                    "message_delta" => {
                        if let Ok(msg_delta) = serde_json::from_str::<MessageDelta>(&event.data) {
                            let usage = msg_delta.usage.map(|u| TokenUsage {
                                input_tokens,
                                output_tokens: u.output_tokens,
                            });
                            yield Ok(Chunk {
                                choices: vec![ChunkChoice {
                                    index: 0,
                                    delta: ChunkDelta::default(),
                                    finish_reason: msg_delta.delta.stop_reason,
                                }],
                                usage,
                            });
                        }
                    }
                    _ => {}
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

// ---------------------------------------------------------------------------
// Wire types (mirrors Anthropic's Messages API schema)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct CreateMessageRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    temperature: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: AnthropicContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<AnthropicContentBlock>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Deserialize)]
struct CreateMessageResponse {
    content: Vec<AnthropicContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct MessageStart {
    message: MessageStartInner,
}

#[derive(Debug, Deserialize)]
struct MessageStartInner {
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlockStart {
    content_block: AnthropicContentBlock,
}

#[derive(Debug, Deserialize)]
struct ContentBlockDelta {
    delta: ContentDelta,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    ThinkingDelta { thinking: String },
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    delta: MessageDeltaInner,
    #[serde(default)]
    usage: Option<MessageDeltaUsage>,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaInner {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaUsage {
    #[serde(default)]
    output_tokens: u32,
}
