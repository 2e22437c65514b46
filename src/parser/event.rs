//! Normalized stream events produced by both parser backends
//! (`parser::native` and `parser::tag`). The advisor chain and run loop
//! consume only this vocabulary; they never see provider chunks directly.

/// One unit of progress from a streamed model turn.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A fragment of assistant-visible text.
    Text(String),
    /// A new tool call has started; `index` is stable for the remainder of
    /// this call's lifetime within the turn.
    ToolCallStart {
        index: usize,
        id: String,
        name: String,
    },
    /// A fragment of a tool call's JSON arguments, in emission order.
    ToolCallArgs { index: usize, fragment: String },
    /// A tool call's argument stream is complete.
    ToolCallEnd { index: usize },
    /// The turn ended; carries the reason the provider gave.
    Done { finish_reason: FinishReasonKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReasonKind {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other,
}

impl From<&crate::llm::FinishReason> for FinishReasonKind {
    fn from(value: &crate::llm::FinishReason) -> Self {
        match value {
            crate::llm::FinishReason::Stop => FinishReasonKind::Stop,
            crate::llm::FinishReason::Length => FinishReasonKind::Length,
            crate::llm::FinishReason::ToolCalls => FinishReasonKind::ToolCalls,
            crate::llm::FinishReason::ContentFilter => FinishReasonKind::ContentFilter,
            crate::llm::FinishReason::Other(_) => FinishReasonKind::Other,
        }
    }
}
