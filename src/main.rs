//! relay-sim - headless relay runner
//!
//! Runs a relay for a fixed number of ticks and prints the final snapshot
//! and server statistics as JSON.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::LevelFilter;
use relay_race::{RelayConfig, RelayServer};
use serde_json::json;

#[derive(Parser, Debug)]
#[command(name = "relay-sim", version, about = "Run a baton relay simulation headless")]
struct Cli {
    /// JSON relay configuration; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 3600)]
    ticks: u64,

    /// Simulation seconds per tick.
    #[arg(long, default_value_t = 1.0 / 60.0)]
    delta: f32,

    /// Spawn seed, overriding the configuration.
    #[arg(long)]
    seed: Option<u64>,

    /// Log level (off, error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level: LevelFilter = cli
        .log_level
        .parse()
        .map_err(|_| anyhow!("unknown log level '{}'", cli.log_level))?;
    fast_log::init(fast_log::config::Config::new().console().level(level))
        .map_err(|e| anyhow!("failed to initialize logging: {e}"))?;

    let mut config = match &cli.config {
        Some(path) => RelayConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RelayConfig::default(),
    };
    if cli.seed.is_some() {
        config.rng_seed = cli.seed;
    }

    let mut server = RelayServer::new();
    server.init(config).context("relay could not start")?;
    server.start();

    for _ in 0..cli.ticks {
        server.tick(cli.delta);
    }

    let report = json!({
        "snapshot": server.snapshot(),
        "stats": server.stats(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    log::logger().flush();
    Ok(())
}
