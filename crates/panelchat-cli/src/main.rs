//! panelchat - host for a model-backed chat panel
//!
//! `serve` speaks the panel command protocol as JSON lines on stdin/stdout so
//! any UI surface can attach; `chat` is an interactive terminal surface.

mod chat;
mod serve;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use panelchat_core::config::{Config, ConfigManager};
use panelchat_core::provider::{AnthropicClient, ModelClient};
use panelchat_core::session::{HistoryStore, SessionConfig};
use panelchat_core::tools::ToolRegistryBuilder;

#[derive(Parser)]
#[command(name = "panelchat")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Chat panel with a bounded model tool-use loop", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Workspace directory (defaults to general.workspace_dir, then ".")
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    /// Model to use (overrides provider.model)
    #[arg(short, long)]
    model: Option<String>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Persist conversation history between runs
    #[arg(long)]
    persist: bool,

    /// Register the run_command tool
    #[arg(long)]
    terminal: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Execute a single prompt and exit
    #[arg(long)]
    one_shot: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the panel protocol as JSON lines on stdin/stdout
    Serve,

    /// Interactive chat mode
    Chat,

    /// Show available tools
    Tools,

    /// Show configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _log_guard = init_logging(cli.verbose, cli.log_file.as_deref())?;

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path.clone())?,
        None => ConfigManager::new()?,
    };
    let config_path = manager.path().to_path_buf();
    let mut config = manager.into_config();
    apply_overrides(&mut config, &cli);

    let workspace = resolve_workspace(cli.workspace.as_deref(), &config);
    tracing::debug!(workspace = %workspace.display(), "Resolved workspace");

    if let Some(prompt) = cli.one_shot.as_deref() {
        let (session, client, store) = build_session(&config, &workspace);
        return chat::run_one_shot(session, client, store, prompt).await;
    }

    match cli.command {
        Some(Commands::Serve) => {
            let (session, client, store) = build_session(&config, &workspace);
            serve::run(session, client, store).await
        }
        Some(Commands::Tools) => {
            show_tools(&config, &workspace);
            Ok(())
        }
        Some(Commands::Config) => show_config(&config, &config_path, &workspace),
        Some(Commands::Chat) | None => {
            if config.provider.resolve_api_key().is_none() {
                show_setup_instructions(&config);
            }
            let (session, client, store) = build_session(&config, &workspace);
            chat::run(session, client, store).await
        }
    }
}

/// Install the tracing subscriber.
///
/// Logs go to stderr; stdout carries the panel protocol in `serve`.
fn init_logging(
    verbose: bool,
    log_file: Option<&Path>,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let default_filter = if verbose { "info,panelchat_core=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file path: {}", path.display()))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Apply command-line flags on top of the loaded configuration
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(model) = &cli.model {
        config.provider.model = model.clone();
    }
    if cli.persist {
        config.session.persist_history = true;
    }
    if cli.terminal {
        config.session.enable_terminal = true;
    }
}

fn resolve_workspace(arg: Option<&Path>, config: &Config) -> PathBuf {
    let requested = arg
        .map(Path::to_path_buf)
        .or_else(|| config.general.workspace_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    // dunce avoids the \\?\ prefix on Windows
    dunce::canonicalize(&requested).unwrap_or_else(|_| {
        std::env::current_dir()
            .map(|cwd| cwd.join(&requested))
            .unwrap_or(requested)
    })
}

fn build_session(
    config: &Config,
    workspace: &Path,
) -> (SessionConfig, Arc<dyn ModelClient>, Option<HistoryStore>) {
    let session = SessionConfig::from_config(config, Some(workspace.to_path_buf()));
    let client: Arc<dyn ModelClient> = Arc::new(AnthropicClient::new(config.provider.clone()));
    let store = config
        .session
        .persist_history
        .then(|| HistoryStore::in_default_dir(&config.session.history_key));
    (session, client, store)
}

fn show_tools(config: &Config, workspace: &Path) {
    println!("{}", style("Available Tools:").bold());
    println!();

    let registry = ToolRegistryBuilder::new(panelchat_core::tools::filesystem::Workspace::new(workspace))
        .with_terminal_if(config.session.enable_terminal, config.terminal.clone())
        .build();

    for def in registry.list() {
        println!("  {}", style(&def.name).cyan().bold());
        println!("    {}", style(&def.description).dim());
    }

    if !config.session.enable_terminal {
        println!();
        println!(
            "  {}",
            style("run_command is disabled; pass --terminal or set session.enable_terminal").dim()
        );
    }
}

fn show_config(config: &Config, path: &Path, workspace: &Path) -> anyhow::Result<()> {
    println!("{}", style("Configuration:").bold());
    println!();
    println!("  Config file: {}", style(path.display()).dim());
    println!("  Workspace:   {}", style(workspace.display()).green());
    let key_status = if config.provider.resolve_api_key().is_some() {
        style("configured".to_string()).green()
    } else {
        style(format!("missing (set {})", config.provider.api_key_env)).red()
    };
    println!("  API key:     {}", key_status);
    println!();

    let mut shown = config.clone();
    if shown.provider.api_key.is_some() {
        shown.provider.api_key = Some("********".to_string());
    }
    println!("{}", toml::to_string_pretty(&shown)?);
    Ok(())
}

fn show_setup_instructions(config: &Config) {
    eprintln!("{}", style("No API key found.").yellow().bold());
    eprintln!();
    eprintln!("  Set it in your environment:");
    eprintln!("    export {}=<your key>", config.provider.api_key_env);
    eprintln!();
    eprintln!("  or add it to the config file:");
    eprintln!("    [provider]");
    eprintln!("    api_key = \"<your key>\"");
    eprintln!();
}
