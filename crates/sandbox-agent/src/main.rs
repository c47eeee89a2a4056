//! Run the sandboxed Gemini agent from the command line.
//!
//! Reads the API key from `GEMINI_API_KEY` (a `.env` file in the launch
//! directory is loaded first).
//!
//! # Examples
//!
//! ```sh
//! # One task, then exit
//! sandbox-agent --directory ./project --task "Summarize README.md into summary.txt"
//!
//! # Interactive: one task per line, `exit` to quit
//! sandbox-agent --directory ./project
//!
//! # Different model and tighter backoff
//! sandbox-agent --model gemini-2.5-pro --initial-backoff-seconds 2 --max-backoff-seconds 30
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use sandbox_agent::config::Settings;
use sandbox_agent::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt};

/// A Gemini agent that can read, write, and run commands inside one directory.
#[derive(Parser)]
#[command(name = "sandbox-agent", version)]
struct Cli {
    /// Directory the agent is confined to
    #[arg(long, default_value = ".")]
    directory: PathBuf,

    /// Run this task once and exit instead of prompting
    #[arg(long)]
    task: Option<String>,

    #[command(flatten)]
    settings: Settings,
}

/// Filter used when `RUST_LOG` is unset. Retry and tool notices already
/// reach stdout through [`ConsoleHandler`], so stderr only carries errors.
const DEFAULT_LOG_FILTER: &str = "error";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), String> {
    let sandbox = PathSandbox::new(&cli.directory).map_err(|e| e.to_string())?;
    cli.settings.validate().map_err(|e| e.to_string())?;
    let api_key = cli.settings.credential().map_err(|e| e.to_string())?;

    let mut client =
        GeminiClient::new(api_key, cli.settings.model.as_str()).map_err(|e| e.to_string())?;
    if let Some(base) = &cli.settings.api_base {
        client = client.with_base_url(base.as_str());
    }
    info!(
        "Sandbox root: {}, model: {}",
        sandbox.root().display(),
        client.model()
    );

    let tools = ToolSet::new(sandbox);
    let handler = CompositeEventHandler::new()
        .with(LoggingHandler)
        .with(ConsoleHandler);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    let agent = Agent::new(&client, &tools, cli.settings.agent_config())
        .with_event_handler(&handler)
        .with_cancellation(cancel.clone());

    // ── One-shot mode ───────────────────────────────────────────
    if let Some(task) = &cli.task {
        agent.run_task(task).await.map_err(|e| e.to_string())?;
        return Ok(());
    }

    // ── Interactive mode ────────────────────────────────────────
    println!(
        "Agent started in {}. Enter 'exit' to quit.",
        tools.sandbox().root().display()
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout()
            .flush()
            .map_err(|e| format!("failed to write prompt: {e}"))?;

        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line.map_err(|e| format!("failed to read stdin: {e}"))?,
        };
        let Some(line) = line else {
            println!();
            break;
        };
        let task = line.trim();
        if task.is_empty() {
            continue;
        }
        if task.eq_ignore_ascii_case("exit") {
            break;
        }

        match agent.run_task(task).await {
            Ok(_) => {}
            Err(AgentError::Cancelled) => {
                eprintln!("Error: {}", AgentError::Cancelled);
                break;
            }
            Err(e) => eprintln!("Error: {e}"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    // Best effort: a missing .env is not an error.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;
    use tracing_subscriber::{Layer, Registry};

    #[test]
    fn default_filter_keeps_warnings_off_stderr() {
        let filter = EnvFilter::new(DEFAULT_LOG_FILTER);
        assert_eq!(
            Layer::<Registry>::max_level_hint(&filter),
            Some(LevelFilter::ERROR)
        );
    }

    #[test]
    fn cli_defaults_to_current_directory() {
        let cli = Cli::parse_from(["sandbox-agent", "--task", "list files"]);
        assert_eq!(cli.directory, PathBuf::from("."));
        assert_eq!(cli.task.as_deref(), Some("list files"));
    }
}
