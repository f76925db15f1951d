// byteforge CLI - interactive agent REPL

use anyhow::{Context, Result};
use byteforge::config::{load_settings, Settings};
use byteforge::provider::HttpChatProvider;
use byteforge::session::cancel::install_ctrlc_handler;
use byteforge::session::{AgentSession, SessionConfig};
use byteforge::tools::implementations::{
    FsTools, ProviderTools, SearchTools, ShellTools, TodoTools,
};
use byteforge::tools::provider::ToolProviderRegistry;
use byteforge::tools::todo::TodoStore;
use byteforge::tools::{PermissionMode, StdinConfirmer, ToolExecutor, ToolKind, ToolRegistry};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "byteforge", version, about = "LLM coding agent")]
struct Cli {
    /// Path to config.toml (default: ~/.byteforge/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start in a specific permission mode
    #[arg(long, value_parser = parse_mode)]
    mode: Option<PermissionMode>,

    /// Override the context token budget
    #[arg(long)]
    budget: Option<usize>,
}

fn parse_mode(s: &str) -> Result<PermissionMode, String> {
    match s {
        "read-only" => Ok(PermissionMode::ReadOnly),
        "confirm-each" => Ok(PermissionMode::ConfirmEach),
        "auto-approve" => Ok(PermissionMode::AutoApprove),
        other => Err(format!(
            "unknown mode '{}' (expected read-only, confirm-each, auto-approve)",
            other
        )),
    }
}

const SYSTEM_PROMPT: &str = "\
You are a coding agent. To act, emit tool calls as XML-style tags in your reply, \
for example: <read_file><path>src/main.rs</path></read_file>

Available tools:
- read_file(path), list_directory(path), code_search(pattern, path?)
- write_file(path, content), create_file(path, content), delete_file(path)
- insert_code(path, line, content), replace_code(path, start_line, end_line, content)
- execute_command(command)
- add_todo(title, description?, priority?), update_todo(id, status, progress?), show_todos
- plan(content) to record a plan, task_complete(summary) when the task is done
- provider_list_tools, provider_call_tool(server, tool, arguments), \
provider_read_resource(server, uri)

Every field needs its own tag with a matching closing tag. Line numbers are 1-based. \
Call task_complete exactly once, when the whole task is finished.";

fn build_registry(
    settings: &Settings,
    providers: Arc<ToolProviderRegistry>,
) -> (ToolRegistry, Arc<Mutex<TodoStore>>) {
    let todos = Arc::new(Mutex::new(TodoStore::new()));
    let mut registry = ToolRegistry::new();
    registry.register(FsTools::KINDS, Arc::new(FsTools));
    registry.register(SearchTools::KINDS, Arc::new(SearchTools));
    registry.register(
        ShellTools::KINDS,
        Arc::new(ShellTools::new(Duration::from_secs(
            settings.command_timeout_secs,
        ))),
    );
    registry.register(TodoTools::KINDS, Arc::new(TodoTools::new(Arc::clone(&todos))));
    registry.register(ProviderTools::KINDS, Arc::new(ProviderTools::new(providers)));
    // task_complete and plan are handled by the executor itself.
    debug_assert!(registry.get(ToolKind::ReadFile).is_some());
    (registry, todos)
}

async fn print_prompt(mode: PermissionMode) {
    let mut stdout = tokio::io::stdout();
    let _ = stdout
        .write_all(format!("byteforge [{}]> ", mode).as_bytes())
        .await;
    let _ = stdout.flush().await;
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = load_settings(cli.config).context("failed to load configuration")?;

    if settings.api_key.is_empty() {
        tracing::warn!("no api_key configured (set BYTEFORGE_API_KEY or ~/.byteforge/config.toml)");
    }

    let provider = Arc::new(HttpChatProvider::new(
        settings.api_url.clone(),
        settings.api_key.clone(),
        settings.model.clone(),
        settings.temperature,
        settings.max_output_tokens,
    )?);

    let providers = Arc::new(ToolProviderRegistry::from_config(&settings.tool_providers).await);
    let (registry, todos) = build_registry(&settings, providers);
    let executor = ToolExecutor::new(registry, Box::new(StdinConfirmer::new()));

    let config = SessionConfig {
        system_prompt: SYSTEM_PROMPT.to_string(),
        mode: cli.mode.unwrap_or_default(),
        max_iterations: settings.max_iterations,
        context_budget: cli.budget.unwrap_or(settings.context_budget),
        quiet_period: Duration::from_secs(settings.quiet_period_secs),
        max_recovery_prompts: settings.max_recovery_prompts,
    };
    let mut session = AgentSession::new(provider, executor, config);
    session.set_reply_listener(Box::new(|thought| println!("{}", thought)));
    session.set_context_entry(
        "environment",
        &format!(
            "os: {}, cwd: {}",
            std::env::consts::OS,
            std::env::current_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "unknown".into())
        ),
    );

    install_ctrlc_handler(session.cancel_signal())?;

    println!("byteforge {} - /mode cycles permissions, /context shows budget, /exit quits", env!("CARGO_PKG_VERSION"));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print_prompt(session.mode()).await;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/exit" | "/quit" => break,
            "/mode" => {
                let mode = session.cycle_mode();
                println!("mode: {} ({})", mode, mode.description());
            }
            "/context" => {
                let stats = session.context_stats();
                println!(
                    "turns: {}, estimated tokens: {} / {}, summary: {} chars",
                    stats.turns, stats.estimated_tokens, stats.budget, stats.summary_chars
                );
            }
            "/todos" => {
                println!("{}", todos.lock().await.render());
            }
            _ => {
                let outcome = session.handle_user_message(input).await;
                println!("{}", outcome.notice());
            }
        }
    }

    println!("bye");
    Ok(())
}
