use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rulebook_core::impls::{InMemoryStore, StoreFixture, TracingAuditSink};
use rulebook_core::ports::SystemClock;
use rulebook_core::{Dispatcher, RulesConfig, RulesContext};
use tracing::{debug, trace};

/// Run one rules operation against a JSON fixture.
#[derive(Debug, Parser)]
#[command(name = "rulebook", version, about)]
struct Cli {
    /// JSON file with `departments`, `users` and `tasks`
    #[arg(long)]
    fixture: PathBuf,

    /// TOML engine configuration (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Request file; read from stdin when omitted
    #[arg(long)]
    request: Option<PathBuf>,

    /// Print the registered operations and exit
    #[arg(long)]
    list_operations: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .with_target(cli.verbose >= 2)
        .with_line_number(cli.verbose >= 3)
        .init();

    debug!("rulebook started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

/// Returns whether the operation succeeded.
async fn run(cli: Cli) -> Result<bool> {
    let config = match &cli.config {
        Some(path) => RulesConfig::load(path)?,
        None => RulesConfig::default(),
    };

    let raw = std::fs::read_to_string(&cli.fixture)
        .with_context(|| format!("failed to read fixture {}", cli.fixture.display()))?;
    let fixture: StoreFixture = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse fixture {}", cli.fixture.display()))?;
    let store = InMemoryStore::from_fixture(fixture)
        .await
        .context("failed to load fixture")?;

    let ctx = RulesContext::new(
        Arc::new(store),
        Arc::new(TracingAuditSink),
        Arc::new(SystemClock),
        config,
    );
    let dispatcher = Dispatcher::standard(ctx)?;

    if cli.list_operations {
        for name in dispatcher.operations() {
            println!("{name}");
        }
        return Ok(true);
    }

    let request = read_request(cli.request.as_ref())?;
    let response = dispatcher.dispatch(request).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(response.success)
}

fn read_request(path: Option<&PathBuf>) -> Result<serde_json::Value> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read request {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read request from stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("request is not valid JSON")
}
