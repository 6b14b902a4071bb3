//! Environment-sourced runtime configuration.
//!
//! Everything operational lives in the environment so deployments are plain
//! process restarts; the CLI only carries startup switches.

use crate::error::{Result, SyncError};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SHEET_API_URL: &str = "https://sheets.googleapis.com/v4";
pub const DEFAULT_VENDOR_API_URL: &str = "https://dev.api.topuphub.sg";

#[derive(Debug, Clone)]
pub struct Config {
    /// Spreadsheet holding both the work queue and the data sheet
    pub sheet_id: String,
    /// Work-queue sheet name
    pub sheet_name: String,
    /// Data sheet receiving the per-cycle catalog audit rows
    pub data_sheet_name: String,
    /// First row of the data sheet used for audit rows
    pub data_start_index: u32,
    /// Bearer token for the spreadsheet values API
    pub sheet_api_token: String,
    pub sheet_api_url: String,

    /// Vendor catalog API credentials
    pub vendor_api_key: String,
    pub vendor_api_url: String,
    /// Origin header the vendor expects
    pub origin: String,

    /// Row indexes processed per batch
    pub batch_size: usize,
    /// Pause between batches
    pub relax_each_batch: Duration,
    /// Inter-cycle pause when the relax cell is blank or unparsable
    pub relax_each_round: Duration,
    /// Cell on the work-queue sheet holding the operator delay override
    pub relax_time_cell: String,

    /// Validity window for cached denominations
    pub cache_valid: Duration,
    /// Courtesy pause after each game-fields upstream call
    pub notes_fetch_delay: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            sheet_id: require("SHEET_ID")?,
            sheet_name: require("SHEET_NAME")?,
            data_sheet_name: require("SHEET_DATA_NAME")?,
            data_start_index: parse_or("SHEET_DATA_START_INDEX", 3)?,
            sheet_api_token: require("SHEET_API_TOKEN")?,
            sheet_api_url: or_default("SHEET_API_URL", DEFAULT_SHEET_API_URL),
            vendor_api_key: require("VENDOR_API_KEY")?,
            vendor_api_url: or_default("VENDOR_API_URL", DEFAULT_VENDOR_API_URL),
            origin: or_default("ORIGIN", "topuphub.sg"),
            batch_size: parse_or::<usize>("PROCESS_BATCH_SIZE", 10)?.max(1),
            relax_each_batch: secs(parse_or("RELAX_TIME_EACH_BATCH", 2.0)?),
            relax_each_round: secs(parse_or("RELAX_TIME_EACH_ROUND", 600.0)?),
            relax_time_cell: require("RELAX_TIME_CELL")?,
            cache_valid: Duration::from_secs(parse_or::<u64>("CACHE_VALID_DAYS", 7)? * 24 * 3600),
            notes_fetch_delay: secs(parse_or("NOTES_FETCH_DELAY", 10.0)?),
        })
    }
}

fn secs(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0))
}

fn require(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| SyncError::Config(format!("{} is not set", name)))
}

fn or_default(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| SyncError::Config(format!("{} is not a valid value: {}", name, raw))),
        Err(_) => Ok(default),
    }
}
