//! CLI-driven runtime configuration for the agent debug driver.

use clap::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Provider {
    Openai,
    Anthropic,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "agentrt")]
#[command(author, version, about = "Interactive LLM agent runtime", long_about = None)]
pub struct RuntimeConfig {
    /// Model identifier passed through to the engine.
    #[arg(long, default_value = "gpt-4o-mini")]
    pub model: String,

    /// Which concrete LLMEngine to talk to.
    #[arg(long, value_enum, default_value = "openai")]
    pub provider: Provider,

    /// API key for the selected provider. Falls back to OPENAI_API_KEY /
    /// ANTHROPIC_API_KEY if not given.
    #[arg(long)]
    pub api_key: Option<String>,

    /// Treat the provider as lacking native `tool_calls` support, forcing
    /// the tag-mode parser even against a provider that could do native.
    #[arg(long, default_value_t = false)]
    pub tag_mode: bool,

    /// Skip the approval prompt before running any tool.
    #[arg(long, default_value_t = false)]
    pub auto_approve: bool,

    /// Maximum number of tool-dispatch round trips within a single turn
    /// before the run loop aborts with `RunError::RecursionLimit`.
    #[arg(long, default_value_t = 10)]
    pub max_tool_loops: usize,

    #[arg(long, default_value_t = 1.0)]
    pub temperature: f32,

    #[arg(long, default_value_t = 4096)]
    pub max_tokens: u32,
}

impl RuntimeConfig {
    pub fn resolve_api_key(&self) -> Result<String, crate::RunError> {
        if let Some(key) = &self.api_key {
            return Ok(key.clone());
        }
        let env_var = match self.provider {
            Provider::Openai => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        };
        std::env::var(env_var)
            .map_err(|_| crate::RunError::Config(format!("no API key given and {} is not set", env_var)))
    }

    pub fn supports_native_tool_calls(&self) -> bool {
        !self.tag_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_api_key_prefers_explicit_flag_over_env() {
        let config = RuntimeConfig {
            model: "m".to_string(),
            provider: Provider::Openai,
            api_key: Some("explicit".to_string()),
            tag_mode: false,
            auto_approve: false,
            max_tool_loops: 10,
            temperature: 1.0,
            max_tokens: 4096,
        };
        assert_eq!(config.resolve_api_key().unwrap(), "explicit");
    }

    #[test]
    fn tag_mode_flag_flips_native_capability() {
        let mut config = RuntimeConfig {
            model: "m".to_string(),
            provider: Provider::Openai,
            api_key: Some("k".to_string()),
            tag_mode: false,
            auto_approve: false,
            max_tool_loops: 10,
            temperature: 1.0,
            max_tokens: 4096,
        };
        assert!(config.supports_native_tool_calls());
        config.tag_mode = true;
        assert!(!config.supports_native_tool_calls());
    }
}
