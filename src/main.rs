// =============================================================================
// Roomsync - Main Entry Point
// =============================================================================
//
// Project: Roomsync - Matrix client sync-response engine
// Author: arkSong (arksong2018@gmail.com)
// Date: 2025-02-03
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// Description:
//   Command line front end. Loads configuration, installs the tracing
//   subscriber and runs one of the subcommands against the engine.
//
// Runtime Requirements:
//   • Optional ROOMSYNC_CONFIG pointing to a TOML config file
//   • ROOMSYNC_* environment overrides, RUST_LOG for log filtering
//
// =============================================================================

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::{prelude::*, EnvFilter};

use roomsync::core::LoggingConfig;
use roomsync::replay;
use roomsync::{ClientConfig, MemorySession, Syncer};

mod clap;

#[tokio::main]
async fn main() -> Result<()> {
    let start = Instant::now();
    let args = clap::parse();

    let mut config =
        ClientConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    init_tracing(&config.logging)?;

    info!("🚀 Starting roomsync {}", clap::version());
    debug!("🔧 Configuration: {:?}", config);

    match args.command {
        clap::Commands::Replay { payload, since } => {
            let payload = replay::load_payload(&payload)
                .with_context(|| format!("failed to read {}", payload.display()))?;
            let session = Arc::new(MemorySession::new(config.parsed_user_id()?));
            let report = replay::replay(session, payload, &since).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        clap::Commands::Filter { user } => {
            let user_id = match user {
                Some(user) => ruma::UserId::parse(user.as_str())
                    .with_context(|| format!("invalid user id {}", user))?,
                None => config.parsed_user_id()?,
            };
            let syncer = Syncer::new(Arc::new(MemorySession::new(user_id.clone())));
            let filter = syncer.get_filter(&user_id);
            println!("{}", serde_json::to_string_pretty(&filter)?);
        }
    }

    info!("✅ Done in {:?}", start.elapsed());
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .with_context(|| format!("invalid log level {}", logging.level))?;

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format.as_str() {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?,
        _ => registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .try_init()?,
    }
    Ok(())
}
