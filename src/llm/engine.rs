//! The `LLMEngine` port: the one seam between the agent runtime and an
//! actual HTTP provider. Everything above this trait is provider-agnostic.

use futures::Stream;
use std::pin::Pin;

use super::types::{AgentResponse, Chunk, Request};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("api error: {0}")]
    Api(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Chunk, EngineError>> + Send>>;

/// Abstract request/response over a provider. Modeled as an opaque producer
/// of ordered chunks; HTTP transport details live entirely in the concrete
/// implementations (`OpenAiEngine`, `AnthropicEngine`).
#[async_trait::async_trait]
pub trait LLMEngine: Send + Sync {
    /// Non-streaming call; returns the full message with any native
    /// `tool_calls` already assembled.
    async fn call(&self, request: Request) -> Result<AgentResponse, EngineError>;

    /// Lazy, finite, not-restartable stream of chunks. Implementations must
    /// preserve provider ordering per choice index.
    async fn stream(&self, request: Request) -> Result<ChunkStream, EngineError>;
}
