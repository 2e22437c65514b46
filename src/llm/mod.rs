//! Provider-agnostic LLM data model (`types`), the `LLMEngine` port
//! (`engine`), and its concrete implementations.

pub mod engine;
pub mod types;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "anthropic")]
pub mod anthropic;

#[cfg(any(test, feature = "test-util"))]
pub mod scripted;

pub use engine::{ChunkStream, EngineError, LLMEngine};
pub use types::{
    AgentResponse, Capability, Chunk, ChunkChoice, ChunkDelta, FinishReason, GenerateConfig,
    Message, Request, Role, TokenUsage, ToolCall, ToolCallDelta, ToolCallFunction, ToolSchema,
};

#[cfg(feature = "openai")]
pub use openai::OpenAiEngine;

#[cfg(feature = "anthropic")]
pub use anthropic::AnthropicEngine;
