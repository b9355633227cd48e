// =============================================================================
// Roomsync - Clap Module
// =============================================================================
//
// Project: Roomsync - Matrix client sync-response engine
// Author: arkSong (arksong2018@gmail.com)
// Date: 2025-02-03
// Version: 0.3.0
// License: Apache 2.0 / MIT
//
// Description:
//   Command line interface of the roomsync binary.
//
// =============================================================================

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, instrument};

/// Returns the current version of the crate with extra info if supplied
///
/// Set the environment variable `ROOMSYNC_VERSION_EXTRA` at build time to any
/// UTF-8 string to include it in parenthesis after the SemVer version.
#[instrument(level = "debug")]
pub fn version() -> String {
    let cargo_pkg_version = env!("CARGO_PKG_VERSION");

    match option_env!("ROOMSYNC_VERSION_EXTRA") {
        Some(x) => format!("{} ({})", cargo_pkg_version, x),
        None => cargo_pkg_version.to_owned(),
    }
}

/// Roomsync - Matrix client sync-response engine
///
/// Replays recorded `/sync` responses through the engine and prints the
/// filter a client would upload.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[clap(about, version, name = "roomsync")]
pub struct Args {
    /// Path to configuration file
    #[clap(short, long, env = "ROOMSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level or filter directive, overrides the configuration
    #[clap(short, long, global = true)]
    pub log_level: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Process a recorded sync response and print what changed
    Replay {
        /// JSON body of a /sync response
        #[clap(short, long)]
        payload: PathBuf,

        /// Token the response was requested with; empty for an initial sync
        #[clap(short, long, default_value = "")]
        since: String,
    },

    /// Print the sync filter as JSON
    Filter {
        /// User to build the filter for, defaults to the configured user
        #[clap(short, long)]
        user: Option<String>,
    },
}

/// Parse command line arguments
pub fn parse() -> Args {
    let start = Instant::now();
    let args = Args::parse();
    debug!("✅ Command line arguments parsed in {:?}", start.elapsed());
    args
}
