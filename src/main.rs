// ABOUTME: Entry point for the agentdock binary.
// ABOUTME: Parses CLI arguments, initializes tracing, and dispatches to web/run/list commands.

use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use agentdock_core::{discover_apps, load_app, RunEvent, RunEventPayload};
use agentdock_runtime::{builtin_registry, Runner, SessionService};
use agentdock_server::app_state::{recover_sessions, AppState};
use agentdock_server::{create_router, DockConfig, ProviderStatus};

#[derive(Parser)]
#[command(
    name = "agentdock",
    version,
    about = "Local workbench for multi-agent LLM apps"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Discover agent apps under DIR and serve the dev web UI.
    Web {
        /// Directory whose sub-directories are scanned for apps.
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Override the bind address (default 127.0.0.1:8000).
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Run a single app directory from the terminal.
    Run {
        /// The app directory (containing agentdock.toml and agents.yaml).
        dir: PathBuf,
        /// One-shot query; omit for an interactive prompt.
        #[arg(long)]
        query: Option<String>,
        /// User id recorded on the session.
        #[arg(long, default_value = "user")]
        user: String,
    },
    /// List discovered apps under DIR.
    List {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agentdock=debug,tower_http=debug".parse().unwrap()),
        )
        .init();

    if let Err(e) = dispatch(Cli::parse()).await {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Web { dir, bind } => serve(dir, bind).await,
        Command::Run { dir, query, user } => run_app(dir, query, user).await,
        Command::List { dir } => list(dir),
    }
}

/// Discover apps, recover persisted sessions, and serve the dev UI.
async fn serve(dir: PathBuf, bind: Option<SocketAddr>) -> anyhow::Result<()> {
    let mut config = DockConfig::from_env()?;
    if let Some(bind) = bind {
        config.bind = bind;
    }

    let apps =
        discover_apps(&dir).with_context(|| format!("failed to scan {}", dir.display()))?;
    if apps.is_empty() {
        tracing::warn!(dir = %dir.display(), "no agent apps found");
    }

    let provider_status = ProviderStatus::detect();
    if !provider_status.any_available {
        tracing::warn!("no model provider configured; set GOOGLE_API_KEY to run agents");
    }

    let state = Arc::new(AppState::new(
        config.clone(),
        apps.into_iter().map(Arc::new).collect(),
        provider_status,
    )?);
    recover_sessions(&state).await;

    let router = create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!(bind = %config.bind, apps = state.apps.len(), "agentdock starting up");
    println!("agentdock dev UI on http://{}", config.bind);

    axum::serve(listener, router).await?;
    Ok(())
}

/// Run one app from the terminal, streaming events as they happen.
async fn run_app(dir: PathBuf, query: Option<String>, user: String) -> anyhow::Result<()> {
    let app = Arc::new(
        load_app(&dir).with_context(|| format!("failed to load app from {}", dir.display()))?,
    );

    let missing = app.manifest.missing_env();
    if !missing.is_empty() {
        anyhow::bail!(
            "missing required environment variables: {}",
            missing.join(", ")
        );
    }

    let provider = std::env::var("AGENTDOCK_DEFAULT_PROVIDER")
        .ok()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "gemini".to_string());
    let default_model = std::env::var("AGENTDOCK_DEFAULT_MODEL").ok();

    let runner = Runner::from_provider(
        Arc::clone(&app),
        Arc::new(builtin_registry()),
        &provider,
        default_model.as_deref(),
    )?;

    let service = SessionService::new();
    let session = service.create_session(app.name(), &user).await;

    let mut rx = session.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            print_event(&event);
        }
    });

    match query {
        Some(q) => {
            runner.run(&session, &q).await?;
        }
        None => {
            println!("{} ready. Type a message, or 'exit' to quit.", app.name());
            let stdin = std::io::stdin();
            loop {
                print!("> ");
                std::io::stdout().flush()?;
                let mut line = String::new();
                if stdin.read_line(&mut line)? == 0 {
                    break;
                }
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "exit" || line == "quit" {
                    break;
                }
                if let Err(e) = runner.run(&session, line).await {
                    eprintln!("run failed: {}", e);
                }
            }
        }
    }

    // Let the printer drain the tail of the event stream.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    printer.abort();
    Ok(())
}

/// Print discovered apps, one line each.
fn list(dir: PathBuf) -> anyhow::Result<()> {
    let apps =
        discover_apps(&dir).with_context(|| format!("failed to scan {}", dir.display()))?;
    if apps.is_empty() {
        anyhow::bail!("no agent apps found under {}", dir.display());
    }

    for app in apps {
        println!(
            "{}  ({} agents, root: {})  {}",
            app.name(),
            app.graph.agents.len(),
            app.graph.root_agent,
            app.manifest.app.description
        );
    }
    Ok(())
}

/// Render one run event for the terminal.
fn print_event(event: &RunEvent) {
    match &event.payload {
        RunEventPayload::AgentTurnStarted { agent } => {
            println!("[turn] {}", agent);
        }
        RunEventPayload::TextEmitted { agent, text } => {
            println!("[{}] {}", agent, text);
        }
        RunEventPayload::ToolCallStarted { agent, tool, args } => {
            println!("[tool] {} -> {}({})", agent, tool, args);
        }
        RunEventPayload::ToolCallFinished { tool, .. } => {
            println!("[tool] {} finished", tool);
        }
        RunEventPayload::AgentTransferred { from, to } => {
            println!("[transfer] {} -> {}", from, to);
        }
        RunEventPayload::RunFailed { error } => {
            println!("[error] {}", error);
        }
        RunEventPayload::FinalResponse { .. }
        | RunEventPayload::UserMessageAppended { .. }
        | RunEventPayload::SessionCreated { .. } => {}
    }
}
