//! Price Sync daemon
//!
//! Reconciles vendor top-up pricing into a spreadsheet work queue.
//! Runs continuously; each cycle is independent and failures only skip
//! to the next cycle.

use clap::Parser;
use price_sync::sheet::{SheetsClient, WorkQueue};
use price_sync::{Config, SyncOrchestrator, VendorApiClient};
use std::path::PathBuf;

/// Price sync daemon - reconciles vendor catalog pricing into a spreadsheet
#[derive(Parser, Debug)]
#[command(name = "price_sync")]
#[command(version, about, long_about = None)]
struct Args {
    /// Run a single sync cycle and exit (default: run continuously)
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Directory for the vendor cache files
    #[arg(long, default_value_t = default_cache_dir())]
    cache_dir: String,
}

/// Returns the default cache path: ~/.cache/price_sync
fn default_cache_dir() -> String {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("price_sync")
        .to_string_lossy()
        .to_string()
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let cache_dir = PathBuf::from(&args.cache_dir);
    log::info!("Starting price_sync...");
    log::info!("Cache directory: {}", cache_dir.display());

    let vendor = match VendorApiClient::new(&config, &cache_dir) {
        Ok(vendor) => vendor,
        Err(e) => {
            log::error!("Failed to set up vendor client: {}", e);
            std::process::exit(1);
        }
    };

    let sheets = match SheetsClient::new(&config.sheet_api_url, &config.sheet_api_token) {
        Ok(client) => client,
        Err(e) => {
            log::error!("Failed to set up sheets client: {}", e);
            std::process::exit(1);
        }
    };
    let queue = WorkQueue::new(sheets);

    let orchestrator = SyncOrchestrator::new(config, vendor, queue);

    if args.once {
        if let Err(e) = orchestrator.run_cycle().await {
            log::error!("Cycle failed: {}", e);
            std::process::exit(1);
        }
        log::info!("Cycle completed successfully.");
    } else {
        log::info!("Running in daemon mode");
        orchestrator.run_forever().await;
    }
}
