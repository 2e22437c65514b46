//! The `Agent`: owns conversation history, the tool registry, the advisor
//! chain, and the engine it talks to. Built via `AgentBuilder` rather than
//! subclassed — a specialized agent is an `Agent` constructed with a
//! particular tool set and system prompt, not a different type.

pub mod prompt;
pub mod run_loop;

use std::sync::Arc;

use crate::advisor::{Advisor, AdvisorChain, ToolCallAdvisor};
use crate::llm::{GenerateConfig, LLMEngine, Message};
use crate::parser::TagSet;
use crate::tools::{ToolProvider, ToolRegistry};
use crate::ui::Ui;

/// Per-agent knobs that are not tied to a single request, mirroring
/// `RuntimeConfig`'s CLI-facing fields but owned independently so an
/// embedder can construct an `Agent` without going through `clap`.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub model: String,
    pub auto_approve: bool,
    pub max_tool_loops: usize,
    pub supports_native_tool_calls: bool,
    pub generate_config: GenerateConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            auto_approve: false,
            max_tool_loops: 10,
            supports_native_tool_calls: true,
            generate_config: GenerateConfig::default(),
        }
    }
}

pub struct Agent {
    pub(crate) history: Vec<Message>,
    pub(crate) tools: Arc<ToolRegistry>,
    pub(crate) advisors: AdvisorChain,
    pub(crate) tool_call_advisor: Arc<ToolCallAdvisor>,
    pub(crate) engine: Arc<dyn LLMEngine>,
    pub(crate) ui: Arc<dyn Ui>,
    pub(crate) config: AgentConfig,
}

impl Agent {
    pub fn builder(engine: Arc<dyn LLMEngine>, ui: Arc<dyn Ui>) -> AgentBuilder {
        AgentBuilder::new(engine, ui)
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

pub struct AgentBuilder {
    engine: Arc<dyn LLMEngine>,
    ui: Arc<dyn Ui>,
    tools: ToolRegistry,
    advisors: AdvisorChain,
    tool_call_advisor: Arc<ToolCallAdvisor>,
    system_prompt: Option<String>,
    config: AgentConfig,
}

impl AgentBuilder {
    pub fn new(engine: Arc<dyn LLMEngine>, ui: Arc<dyn Ui>) -> Self {
        let tool_call_advisor = Arc::new(ToolCallAdvisor::new(TagSet::default()));
        let mut advisors = AdvisorChain::new();
        let advisor_handle: Arc<dyn Advisor> = tool_call_advisor.clone();
        advisors.add(advisor_handle);

        Self {
            engine,
            ui,
            tools: ToolRegistry::new(),
            advisors,
            tool_call_advisor,
            system_prompt: None,
            config: AgentConfig::default(),
        }
    }

    pub fn with_tool(mut self, tool: Box<dyn ToolProvider>) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn with_advisor(mut self, advisor: Arc<dyn Advisor>) -> Self {
        self.advisors.add(advisor);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Agent {
        let mut history = Vec::new();
        if let Some(prompt) = self.system_prompt {
            history.push(Message::system(prompt));
        }

        Agent {
            history,
            tools: Arc::new(self.tools),
            advisors: self.advisors,
            tool_call_advisor: self.tool_call_advisor,
            engine: self.engine,
            ui: self.ui,
            config: self.config,
        }
    }
}
