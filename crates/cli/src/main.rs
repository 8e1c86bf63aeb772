//! codeclaw: a coding agent in your terminal.
//!
//! Usage:
//! - `codeclaw`              interactive session in the current directory
//! - `codeclaw -m "<task>"`  run one request and exit
//! - `codeclaw --init`       write a default config file

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use codeclaw_agent::{AgentLoop, AgentSettings, ContextBudget, RunOutcome, SystemPromptBuilder};
use codeclaw_config::AppConfig;
use codeclaw_session::{FileSessionStore, InMemorySessionStore, SessionStore};
use tracing::{info, warn};

mod console;
mod repl;
mod view;

use console::{Console, Shutdown};
use repl::Repl;
use view::TerminalView;

#[derive(Parser)]
#[command(name = "codeclaw", about = "codeclaw: a coding agent in your terminal", version)]
struct Cli {
    /// Run a single request and exit
    #[arg(short, long)]
    message: Option<String>,

    /// Override the configured model
    #[arg(long, env = "CODECLAW_MODEL")]
    model: Option<String>,

    /// Project directory to work in (default: current directory)
    #[arg(short = 'C', long)]
    dir: Option<PathBuf>,

    /// Keep the conversation in memory only
    #[arg(long)]
    no_persist: bool,

    /// Write a default config file and exit
    #[arg(long)]
    init: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr and stay quiet by default so they don't tear the live render
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if cli.init {
        return init_config();
    }

    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(model) = cli.model {
        config.default_model = model;
    }

    if !config.has_api_key() {
        print_key_help();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let workspace = match cli.dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    let provider = codeclaw_providers::build_from_config(&config)?;
    let tools = Arc::new(codeclaw_tools::default_registry(&workspace, &config));
    let store: Arc<dyn SessionStore> = if cli.no_persist {
        Arc::new(InMemorySessionStore::new())
    } else {
        Arc::new(FileSessionStore::new(AppConfig::session_path()))
    };

    let shutdown = Shutdown::new();
    let console = Arc::new(Console::spawn(shutdown.clone()));

    let agent = Arc::new(
        AgentLoop::new(
            provider,
            tools,
            console.clone(),
            store,
            SystemPromptBuilder::new(&workspace),
            AgentSettings::from_config(&config),
        )
        .with_budget(ContextBudget::from_config(&config.context))
        .with_interrupt(shutdown.subscribe()),
    );
    agent.restore().await;

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received; finishing the current step");
                shutdown.trigger();
            }
        });
    }

    let throttle = Duration::from_millis(config.ui.render_throttle_ms);

    if let Some(message) = cli.message {
        let mut view = TerminalView::new(agent.ui(), throttle);
        let outcome = agent.run(&message, &mut view).await?;
        match outcome {
            RunOutcome::Completed { summary: Some(summary) } => println!("{summary}"),
            RunOutcome::Interrupted => eprintln!("Interrupted."),
            _ => {}
        }
        return Ok(());
    }

    println!("codeclaw · {} · {}", config.default_model, workspace.display());
    Repl::new(agent.clone(), console, shutdown, throttle).run().await;

    if let Err(e) = agent.save().await {
        warn!(error = %e, "Failed to save session on exit");
    }
    println!("Session saved. Goodbye.");
    Ok(())
}

fn init_config() -> Result<(), Box<dyn std::error::Error>> {
    let dir = AppConfig::config_dir();
    let path = dir.join("config.toml");
    if path.exists() {
        println!("Config already exists: {}", path.display());
        return Ok(());
    }
    std::fs::create_dir_all(&dir)?;
    std::fs::write(&path, AppConfig::default_toml())?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn print_key_help() {
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    OPENROUTER_API_KEY=sk-or-v1-...   (recommended)");
    eprintln!("    OPENAI_API_KEY=sk-...             (OpenAI direct; also set CODECLAW_BASE_URL)");
    eprintln!("    CODECLAW_API_KEY=...              (generic)");
    eprintln!();
    eprintln!("  Or add `api_key` to {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!("  (run `codeclaw --init` to create it)");
    eprintln!();
}
