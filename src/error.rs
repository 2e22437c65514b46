//! Error taxonomy for tool execution and the agent run loop.
//!
//! `ToolError` carries the recoverable failures (schema/coercion violations,
//! a tool's own runtime failure) that the run loop turns into a tool-result
//! message and keeps going. `RunError` carries the fatal failures that end
//! a turn and propagate to the UI.

use std::fmt;

/// A tool argument or execution failure. Never crashes the run loop; the
/// run loop converts these into a `role: tool` message and continues.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("parameter error in tool '{tool}': {message}")]
    Parameter { tool: String, message: String },

    #[error("execution error in tool '{tool}': {message}")]
    Execution { tool: String, message: String },
}

impl ToolError {
    pub fn parameter(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parameter {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn execution(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn tool_name(&self) -> &str {
        match self {
            ToolError::Parameter { tool, .. } => tool,
            ToolError::Execution { tool, .. } => tool,
        }
    }
}

/// Fatal errors that end the current turn and return control to the caller
/// without corrupting history.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("stream error: {0}")]
    Stream(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("maximum tool loop depth ({0}) exceeded")]
    RecursionLimit(usize),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcome of dispatching a single tool call, used to build the
/// system-generated tool-result content in the run loop.
#[derive(Debug)]
pub enum ToolOutcome {
    Success(String),
    Error(ToolError),
    Unknown { name: String, available: Vec<String> },
    ApprovalDenied { reply: Option<String> },
    InvalidArguments { reason: String },
}

impl fmt::Display for ToolOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolOutcome::Success(s) => write!(f, "{}", s),
            ToolOutcome::Error(e) => write!(f, "{}", e),
            ToolOutcome::Unknown { name, available } => write!(
                f,
                "Tool '{}' not found. Available: [{}]",
                name,
                available.join(", ")
            ),
            ToolOutcome::ApprovalDenied { reply } => match reply {
                Some(r) if !r.is_empty() => write!(f, "User declined this tool call: {}", r),
                _ => write!(f, "User declined this tool call."),
            },
            ToolOutcome::InvalidArguments { reason } => {
                write!(f, "ParameterError: invalid JSON arguments ({})", reason)
            }
        }
    }
}
