use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use arena::client::HttpCompletionClient;
use arena::config::ArenaConfig;
use arena::engine::Engine;
use arena::events::FightEventBus;
use arena::pool::load_pool;

#[derive(Parser, Debug)]
#[command(name = "arena", about = "Autonomous LLM debate arena", version)]
struct Args {
    /// Path to the discovered model pool file.
    #[arg(long)]
    pool_file: Option<PathBuf>,

    /// Directory for fight result records.
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Number of fights to run before exiting (default: run forever).
    #[arg(long)]
    fights: Option<u32>,

    /// Override the cooldown between rounds, in seconds.
    #[arg(long)]
    round_cooldown_secs: Option<u64>,

    /// Override the cooldown between fights, in seconds.
    #[arg(long)]
    fight_cooldown_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut cfg = ArenaConfig::default();
    if let Some(pool_file) = args.pool_file {
        cfg.pool_path = pool_file;
    }
    if let Some(results_dir) = args.results_dir {
        cfg.results_dir = results_dir;
    }
    if let Some(secs) = args.round_cooldown_secs {
        cfg.fight.round_cooldown = Duration::from_secs(secs);
    }
    if let Some(secs) = args.fight_cooldown_secs {
        cfg.fight_cooldown = Duration::from_secs(secs);
    }

    let pool = load_pool(&cfg.pool_path)
        .with_context(|| format!("loading model pool from {}", cfg.pool_path.display()))?;

    let client = Arc::new(HttpCompletionClient::new(&cfg.api_base, &cfg.api_key_env));
    let events = FightEventBus::new().shared();

    // Log the event stream; other sinks subscribe the same way.
    let mut log_rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = log_rx.recv().await {
            info!(
                event_type = event.event_type(),
                fight_id = event.fight_id(),
                round = event.round(),
                "event"
            );
        }
    });

    let mut engine = Engine::new(client, events, cfg, pool)?;
    engine.run_loop(args.fights).await?;
    Ok(())
}
