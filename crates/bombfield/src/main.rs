use std::time::Duration;

use bombfield::prelude::*;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Three-player bombing arena server.
#[derive(Debug, Parser)]
#[command(name = "bombfield", version, about)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:3000")]
    bind: String,

    /// Route every participant into one session instead of opening new ones.
    #[arg(long)]
    single_room: bool,

    /// Chance that a destroyed block drops a power-up.
    #[arg(long, default_value_t = 0.3)]
    power_up_chance: f64,

    /// Accept moves as fast as clients send them.
    #[arg(long)]
    no_move_throttle: bool,

    /// Drop connections that send nothing, not even a ping, for this many
    /// seconds. Unset means never.
    #[arg(long)]
    idle_timeout_secs: Option<u64>,

    /// Seed for board layout and power-up drops.
    #[arg(long)]
    seed: Option<u64>,

    /// Filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

fn setup_logging(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), BombfieldError> {
    let args = Args::parse();
    setup_logging(&args.log_level, args.json_logs);

    let config = EngineConfig {
        matchmaking: if args.single_room {
            MatchmakingMode::Single
        } else {
            MatchmakingMode::Multi
        },
        power_up_chance: args.power_up_chance.clamp(0.0, 1.0),
        throttle_moves: !args.no_move_throttle,
        ..EngineConfig::default()
    };

    let mut builder = BombfieldServer::builder()
        .bind(&args.bind)
        .engine_config(config);
    if let Some(secs) = args.idle_timeout_secs {
        builder = builder.idle_timeout(Duration::from_secs(secs));
    }
    if let Some(seed) = args.seed {
        builder = builder.seed(seed);
    }
    let server = builder.build().await?;

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            Ok(())
        }
    }
}
