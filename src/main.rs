//! Headless simulator for the slash-prompt engine
//!
//! Reads JSONL commands on stdin (see `slash_prompt::simulator`) and writes
//! one JSON object per output line on stdout. Logs go to stderr and the JSONL
//! log file.
//!
//! ```bash
//! printf '%s\n' \
//!   '{"type":"create","element":1,"text":"Hi "}' \
//!   '{"type":"type","element":1,"text":"/"}' \
//!   '{"type":"tick","ms":250}' \
//!   '{"type":"type","element":1,"text":"wor"}' \
//!   '{"type":"key","element":1,"key":"Enter"}' | slash-prompt --memory
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use slash_prompt::config::{self, Config};
use slash_prompt::logging;
use slash_prompt::messaging::{BackgroundService, RemoteOptimizer, RemoteStore};
use slash_prompt::optimize::{ChatOptimizer, Optimizer, UreqTransport};
use slash_prompt::simulator::{start_stdin_listener, Simulator};
use slash_prompt::store::{JsonPromptStore, PromptStore};
use slash_prompt::ShortcutEngine;

/// Drive the "/" prompt shortcut engine from JSONL commands on stdin.
#[derive(Parser, Debug, Clone)]
#[command(version)]
struct Cli {
    /// Prompt library file (defaults to the configured storage path).
    #[arg(long, value_name = "FILE")]
    store: Option<PathBuf>,

    /// Config file (defaults to ~/.slashprompt/config.json).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Search a snapshot of the library instead of querying the store.
    #[arg(long, default_value_t = false)]
    offline: bool,

    /// Keep the library in memory only.
    #[arg(long, default_value_t = false, conflicts_with = "store")]
    memory: bool,
}

fn load(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    };
    if cli.offline {
        let mut storage = config.get_storage();
        storage.offline = true;
        config.storage = Some(storage);
    }
    config
}

fn open_store(cli: &Cli, config: &Config) -> anyhow::Result<JsonPromptStore> {
    if cli.memory {
        return Ok(JsonPromptStore::in_memory());
    }
    let path = cli
        .store
        .clone()
        .unwrap_or_else(|| config.get_storage().resolved_path());
    JsonPromptStore::open(&path)
        .with_context(|| format!("failed to open prompt library at {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init();

    let config = load(&cli);
    let store = open_store(&cli, &config)?;
    let optimize_config = config.get_optimize();
    let optimizer: Option<Arc<dyn Optimizer>> = optimize_config
        .api_key()
        .is_some()
        .then(|| {
            Arc::new(ChatOptimizer::<UreqTransport>::from_config(&optimize_config))
                as Arc<dyn Optimizer>
        });
    info!(
        optimizer = optimizer.is_some(),
        offline = cli.offline,
        "Starting simulator"
    );

    // The library and the optimizer live behind the background service
    let service = BackgroundService::new(Arc::new(store), optimizer.clone());
    let (bridge, service_thread) = service.spawn();
    let bridge = Arc::new(bridge);
    let remote_store: Arc<dyn PromptStore> = Arc::new(RemoteStore::new(bridge.clone()));
    let remote_optimizer = optimizer
        .map(|_| Arc::new(RemoteOptimizer::new(bridge.clone())) as Arc<dyn Optimizer>);
    drop(bridge);

    let engine = ShortcutEngine::new(&config, remote_store);
    let mut simulator = Simulator::new(engine, remote_optimizer);

    let commands = start_stdin_listener();
    let stdout = std::io::stdout();
    while let Ok(command) = commands.recv_blocking() {
        let mut out = stdout.lock();
        for line in simulator.apply(command) {
            serde_json::to_writer(&mut out, &line)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
    }

    drop(simulator);
    if service_thread.join().is_err() {
        anyhow::bail!("background service panicked");
    }
    info!("Simulator finished");
    Ok(())
}
