//! Deterministic `LLMEngine` test double that plays back a fixed sequence
//! of chunks per call, independent of network access. Used by the run-loop
//! scenario tests; not compiled into release builds.

use futures::stream;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::engine::{ChunkStream, EngineError, LLMEngine};
use super::types::{AgentResponse, Chunk, FinishReason, Request, TokenUsage};

/// One scripted turn: a final `AgentResponse` plus the chunk sequence that
/// should be replayed when `stream()` is called for this turn.
pub struct ScriptedTurn {
    pub chunks: Vec<Chunk>,
    pub response: AgentResponse,
}

impl ScriptedTurn {
    pub fn text(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            chunks: vec![Chunk {
                choices: vec![super::types::ChunkChoice {
                    index: 0,
                    delta: super::types::ChunkDelta {
                        role: None,
                        content: Some(content.clone()),
                        tool_calls: None,
                    },
                    finish_reason: Some("stop".to_string()),
                }],
                usage: None,
            }],
            response: AgentResponse {
                content,
                finish_reason: FinishReason::Stop,
                tool_calls: vec![],
                usage: TokenUsage::default(),
            },
        }
    }
}

pub struct ScriptedEngine {
    turns: Vec<ScriptedTurn>,
    cursor: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new(turns: Vec<ScriptedTurn>) -> Self {
        Self {
            turns,
            cursor: AtomicUsize::new(0),
        }
    }

    fn next_turn(&self) -> Result<&ScriptedTurn, EngineError> {
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.turns
            .get(idx)
            .ok_or_else(|| EngineError::Config(format!("no scripted turn at index {}", idx)))
    }
}

#[async_trait::async_trait]
impl LLMEngine for ScriptedEngine {
    async fn call(&self, _request: Request) -> Result<AgentResponse, EngineError> {
        Ok(self.next_turn()?.response.clone())
    }

    async fn stream(&self, _request: Request) -> Result<ChunkStream, EngineError> {
        let turn = self.next_turn()?;
        let items: Vec<Result<Chunk, EngineError>> =
            turn.chunks.iter().cloned().map(Ok).collect();
        Ok(Box::pin(stream::iter(items)))
    }
}
