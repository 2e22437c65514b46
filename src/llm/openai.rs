//! OpenAI-compatible engine implementation using reqwest + SSE streaming.
//!
//! Works against the real OpenAI `/chat/completions` endpoint and against
//! any OpenAI-compatible local server (LMStudio, Ollama, vLLM) by pointing
//! `base_url` elsewhere.

use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::engine::{ChunkStream, EngineError, LLMEngine};
use super::types::{
    AgentResponse, Chunk, ChunkChoice, ChunkDelta, FinishReason, Message, Request, Role,
    ToolCallDelta, TokenUsage,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone)]
pub struct OpenAiEngine {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiEngine {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn convert_message(msg: &Message) -> ChatMessage {
        match msg.role {
            Role::System => ChatMessage {
                role: "system".to_string(),
                content: msg.content.clone(),
                tool_calls: None,
                tool_call_id: None,
            },
            Role::User => ChatMessage {
                role: "user".to_string(),
                content: msg.content.clone(),
                tool_calls: None,
                tool_call_id: None,
            },
            Role::Assistant => ChatMessage {
                role: "assistant".to_string(),
                content: msg.content.clone(),
                tool_calls: msg.tool_calls.as_ref().map(|calls| {
                    calls
                        .iter()
                        .map(|tc| OpenAiToolCall {
                            id: tc.id.clone(),
                            tool_type: "function".to_string(),
                            function: OpenAiFunctionCall {
                                name: tc.function.name.clone(),
                                arguments: tc.function.arguments.clone(),
                            },
                        })
                        .collect()
                }),
                tool_call_id: None,
            },
            Role::Tool => ChatMessage {
                role: "tool".to_string(),
                content: msg.content.clone(),
                tool_calls: None,
                tool_call_id: msg.tool_call_id.clone(),
            },
        }
    }

    fn build_body(&self, request: &Request, stream: bool) -> ChatCompletionRequest {
        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|t| OpenAiTool {
                        tool_type: "function".to_string(),
                        function: OpenAiFunction {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.parameters.clone(),
                        },
                    })
                    .collect(),
            )
        };

        ChatCompletionRequest {
            model: request.model.clone(),
            messages: request.messages.iter().map(Self::convert_message).collect(),
            temperature: if tools.is_some() {
                None
            } else {
                Some(request.generate_config.temperature)
            },
            max_tokens: Some(request.generate_config.max_tokens),
            stream,
            stream_options: if stream {
                Some(StreamOptions { include_usage: true })
            } else {
                None
            },
            tools,
        }
    }
}

#[async_trait::async_trait]
impl LLMEngine for OpenAiEngine {
    async fn call(&self, request: Request) -> Result<AgentResponse, EngineError> {
        let body = self.build_body(&request, false);
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(EngineError::Api(format!("HTTP {}: {}", status, text)));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Api(format!("failed to parse response: {}", e)))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::Api("empty choices".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| crate::llm::types::ToolCall {
                id: tc.id,
                call_type: tc.tool_type,
                function: crate::llm::types::ToolCallFunction {
                    name: tc.function.name,
                    arguments: tc.function.arguments,
                },
            })
            .collect();

        Ok(AgentResponse {
            content: choice.message.content.unwrap_or_default(),
            finish_reason: parse_finish_reason(choice.finish_reason.as_deref()),
            tool_calls,
            usage: parsed
                .usage
                .map(|u| TokenUsage {
                    input_tokens: u.prompt_tokens,
                    output_tokens: u.completion_tokens,
                })
                .unwrap_or_default(),
        })
    }

    async fn stream(&self, request: Request) -> Result<ChunkStream, EngineError> {
        let body = self.build_body(&request, true);
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
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
            let mut id_by_index: HashMap<usize, String> = HashMap::new();

            while let Some(event) = event_stream.next().await {
                let event = match event {
                    Ok(e) => e,
                    Err(e) => {
                        yield Err(EngineError::Api(format!("sse error: {}", e)));
                        return;
                    }
                };

                if event.data == "[DONE]" {
                    return;
                }

                let raw: OpenAiStreamChunk = match serde_json::from_str(&event.data) {
                    Ok(v) => v,
                    Err(e) => {
                        yield Err(EngineError::Api(format!("bad chunk: {}", e)));
                        return;
                    }
                };

                if raw.choices.is_empty() {
                    if let Some(u) = raw.usage {
                        yield Ok(Chunk {
                            choices: vec![],
                            usage: Some(TokenUsage {
                                input_tokens: u.prompt_tokens,
                                output_tokens: u.completion_tokens,
                            }),
                        });
                    }
                    continue;
                }

                let mut choices = Vec::with_capacity(raw.choices.len());
                for choice in raw.choices {
                    let tool_calls = choice.delta.tool_calls.map(|deltas| {
                        deltas
                            .into_iter()
                            .map(|d| {
                                if let Some(id) = &d.id {
                                    id_by_index.insert(d.index, id.clone());
                                }
                                ToolCallDelta {
                                    index: d.index,
                                    id: id_by_index.get(&d.index).cloned(),
                                    name: d.function.as_ref().and_then(|f| f.name.clone()),
                                    arguments: d.function.as_ref().and_then(|f| f.arguments.clone()),
                                }
                            })
                            .collect()
                    });

                    choices.push(ChunkChoice {
                        index: choice.index,
                        delta: ChunkDelta {
                            role: choice.delta.role.as_deref().map(|r| match r {
                                "assistant" => Role::Assistant,
                                "user" => Role::User,
                                "system" => Role::System,
                                _ => Role::Assistant,
                            }),
                            content: choice.delta.content,
                            tool_calls,
                        },
                        finish_reason: choice.finish_reason,
                    });
                }

                yield Ok(Chunk { choices, usage: None });
            }
        };

        Ok(Box::pin(stream))
    }
}

fn parse_finish_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("stop") => FinishReason::Stop,
        Some("length") => FinishReason::Length,
        Some("tool_calls") => FinishReason::ToolCalls,
        Some("content_filter") => FinishReason::ContentFilter,
        Some(other) => FinishReason::Other(other.to_string()),
        None => FinishReason::Other("unknown".to_string()),
    }
}

// ---------------------------------------------------------------------------
// Wire types (mirrors OpenAI's chat/completions schema)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAiTool>>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize, Clone)]
struct OpenAiTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAiFunction,
}

#[derive(Debug, Serialize, Clone)]
struct OpenAiFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ResponseChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    index: usize,
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
