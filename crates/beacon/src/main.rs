// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Beacon - message classification and routing for WhatsApp ops groups.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod check;
mod detect;
mod serve;

use std::path::PathBuf;

use beacon_config::model::BeaconConfig;
use clap::{Parser, Subcommand};

/// Beacon - message classification and routing for WhatsApp ops groups.
#[derive(Parser, Debug)]
#[command(name = "beacon", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the search path.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the engine (and the HTTP gateway when enabled).
    Serve,
    /// Run one dynamic category detection pass and print its report.
    Detect,
    /// Check configuration, storage, and collaborator health.
    Check {
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> BeaconConfig {
    let loaded = match path {
        Some(p) => beacon_config::load_and_validate_path(p),
        None => beacon_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            beacon_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Detect) => detect::run_detect(config).await,
        Some(Commands::Check { plain }) => check::run_check(&config, plain).await,
        None => {
            println!("beacon: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber once per process.
pub(crate) fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("beacon={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
