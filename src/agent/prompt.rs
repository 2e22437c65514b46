//! System prompt scaffolding for tag-mode tool calling. Kept as a plain
//! `format!` builder, matching how the rest of the crate constructs prompts
//! and HTTP bodies — no templating crate needed for one scaffold.

use crate::llm::ToolSchema;
use crate::parser::TagSet;

/// Renders the block appended to (or used as) the system prompt when the
/// target model has no native tool-calling support: documents every tool's
/// name, description and JSON schema, and the exact tag syntax the model
/// must reply with.
pub fn render_tool_call_system_prompt(tools: &[ToolSchema], tags: &TagSet) -> String {
    let mut out = String::new();
    out.push_str(
        "You can call tools to help answer the user. To call a tool, reply with exactly one \
         tool call per turn using this syntax:\n\n",
    );
    out.push_str(&format!(
        "{}{}{}{}{{...json arguments...}}{}{}\n\n",
        tags.tool_call_start,
        tags.tool_name_start,
        tags.tool_name_end,
        tags.tool_params_start,
        tags.tool_params_end,
        tags.tool_call_end,
    ));
    out.push_str(&format!(
        "For example: {}{}search{}{}{{\"query\":\"rust async\"}}{}{}\n\n",
        tags.tool_call_start,
        tags.tool_name_start,
        tags.tool_name_end,
        tags.tool_params_start,
        tags.tool_params_end,
        tags.tool_call_end,
    ));
    out.push_str("Available tools:\n");
    for tool in tools {
        out.push_str(&format!(
            "- {}: {}\n  parameters: {}\n",
            tool.name,
            tool.description,
            tool.parameters
        ));
    }
    out
}
