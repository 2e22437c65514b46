use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;

use agentrt::agent::{Agent, AgentConfig};
use agentrt::config::{Provider, RuntimeConfig};
use agentrt::llm::{AnthropicEngine, LLMEngine, OpenAiEngine};
use agentrt::tools::{BashTool, EditorEditTool};
use agentrt::ui::{TerminalUi, Ui};

fn main() -> ExitCode {
    let config = RuntimeConfig::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: RuntimeConfig) -> Result<(), agentrt::RunError> {
    let api_key = config.resolve_api_key()?;

    let engine: Arc<dyn LLMEngine> = match config.provider {
        Provider::Openai => Arc::new(OpenAiEngine::new(api_key)),
        Provider::Anthropic => Arc::new(AnthropicEngine::new(api_key)),
    };
    let ui: Arc<dyn Ui> = Arc::new(TerminalUi::new());

    let mut generate_config = agentrt::llm::GenerateConfig::default();
    generate_config.temperature = config.temperature;
    generate_config.max_tokens = config.max_tokens;

    let mut agent = Agent::builder(engine, ui.clone())
        .with_tool(Box::new(BashTool::new()))
        .with_tool(Box::new(EditorEditTool::new()))
        .with_config(AgentConfig {
            model: config.model.clone(),
            auto_approve: config.auto_approve,
            max_tool_loops: config.max_tool_loops,
            supports_native_tool_calls: config.supports_native_tool_calls(),
            generate_config,
        })
        .build();

    ui.info("Agent runtime ready. Type /help for commands.");

    loop {
        let input = ui.acquire_user_input("> ");
        let trimmed = input.trim();

        match trimmed {
            "/quit" => {
                ui.success("Bye!");
                return Ok(());
            }
            "/help" => {
                ui.info("/help  - show this message");
                ui.info("/clear - clear conversation history");
                ui.info("/quit  - exit");
                ui.info("/status - show current configuration");
                continue;
            }
            "/clear" => {
                agent.clear_history();
                ui.success("History cleared.");
                continue;
            }
            "/status" => {
                ui.info(&format!(
                    "model={} auto_approve={} max_tool_loops={} native_tool_calls={}",
                    agent.config().model,
                    agent.config().auto_approve,
                    agent.config().max_tool_loops,
                    agent.config().supports_native_tool_calls
                ));
                continue;
            }
            "" => continue,
            _ => {}
        }

        if let Err(e) = agent.run(trimmed).await {
            ui.error(&format!("turn failed: {e}"));
        }
        ui.print("");
    }
}
