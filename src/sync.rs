//! Sync cycle orchestration.
//!
//! One cycle: build a fresh catalog snapshot from the vendor, append the
//! audit rows, discover run-flagged queue rows, price them in batches, then
//! pause for the operator-controlled relax time. The supervisor loop never
//! stops: a failed cycle is logged and the next one starts.

use crate::config::Config;
use crate::error::Result;
use crate::retry::RetryPolicy;
use crate::sheet::resolve::find_cells_to_update;
use crate::sheet::row::{AuditRow, BatchCellUpdatePayload, RowDirective, WorkQueue};
use crate::util::{formatted_datetime, sleep_for, split_list, value_to_string};
use crate::vendor::models::{Catalog, CatalogEntry, DenominationMap, DEFAULT_CURRENCY};
use crate::vendor::VendorApiClient;
use chrono::{DateTime, Local};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Check column (B) scanned for run flags
const CHECK_COLUMN_INDEX: usize = 2;

pub struct SyncOrchestrator {
    config: Config,
    vendor: VendorApiClient,
    queue: WorkQueue,
    batch_retry: RetryPolicy,
}

impl SyncOrchestrator {
    pub fn new(config: Config, vendor: VendorApiClient, queue: WorkQueue) -> Self {
        Self::with_batch_retry(
            config,
            vendor,
            queue,
            RetryPolicy::new(5, Duration::from_secs(10)),
        )
    }

    /// Custom batch retry bounds, used by tests to avoid real sleeps.
    pub fn with_batch_retry(
        config: Config,
        vendor: VendorApiClient,
        queue: WorkQueue,
        batch_retry: RetryPolicy,
    ) -> Self {
        Self {
            config,
            vendor,
            queue,
            batch_retry,
        }
    }

    /// Supervisor loop: run cycles forever, logging failures.
    pub async fn run_forever(&self) {
        loop {
            if let Err(e) = self.run_cycle().await {
                log::error!("Cycle failed: {}", e);
            }
        }
    }

    /// One full sync cycle.
    pub async fn run_cycle(&self) -> Result<()> {
        log::info!("# Fetching vendor catalog");
        let catalog = self.fetch_catalog().await?;
        log::info!("## Total games: {}", catalog.len());

        log::info!("Updating data sheet");
        self.append_audit_rows(&catalog).await?;

        let run_indexes = self
            .queue
            .get_run_indexes(
                &self.config.sheet_id,
                &self.config.sheet_name,
                CHECK_COLUMN_INDEX,
            )
            .await?;
        log::info!("{} run rows discovered", run_indexes.len());

        for chunk in split_list(&run_indexes, self.config.batch_size) {
            self.batch_retry
                .run("process_batch", || self.process_batch(&catalog, &chunk))
                .await?;
        }

        let relax = self.read_relax_time().await?;
        sleep_for(relax).await;
        Ok(())
    }

    /// Snapshot the vendor catalog. Listing failures abort the cycle; a
    /// per-game denomination failure degrades that game to an empty map.
    /// Notes fetches are independent and run concurrently.
    async fn fetch_catalog(&self) -> Result<Catalog> {
        log::info!("## Getting games");
        let games = self.vendor.available_games().await?;
        log::info!("## {} games available", games.len());

        log::info!("## Getting denominations");
        let mut denominations: HashMap<String, DenominationMap> = HashMap::new();
        for game in &games {
            match self.vendor.denominations(game).await {
                Ok(map) => {
                    denominations.insert(game.clone(), map);
                }
                Err(e) => {
                    log::warn!("Denomination fetch failed for {}: {}", game, e);
                    denominations.insert(game.clone(), DenominationMap::new());
                }
            }
        }

        log::info!("## Getting game fields");
        let mut tasks = tokio::task::JoinSet::new();
        for game in &games {
            let vendor = self.vendor.clone();
            let game = game.clone();
            tasks.spawn(async move {
                let fields = vendor.game_fields(&game).await;
                (game, fields)
            });
        }
        let mut notes: HashMap<String, String> = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            let (game, fields) = joined?;
            notes.insert(game, fields?.notes);
        }

        let mut catalog = Catalog::default();
        for game in games {
            catalog.insert(CatalogEntry {
                denominations: denominations.remove(&game).unwrap_or_default(),
                notes: notes.remove(&game).unwrap_or_default(),
                currency: DEFAULT_CURRENCY.to_string(),
                game,
            });
        }
        Ok(catalog)
    }

    /// Flatten the catalog into audit rows on the data sheet.
    async fn append_audit_rows(&self, catalog: &Catalog) -> Result<()> {
        let rows = build_audit_rows(
            catalog,
            &self.config.sheet_id,
            &self.config.data_sheet_name,
            self.config.data_start_index,
            Local::now(),
        );
        self.queue
            .batch_update(&self.config.sheet_id, &self.config.data_sheet_name, &rows)
            .await
    }

    /// Price one chunk of run rows and write the results back.
    async fn process_batch(&self, catalog: &Catalog, indexes: &[u32]) -> Result<()> {
        log::info!("Get all run rows from sheet: {:?}", indexes);
        let mut rows: Vec<RowDirective> = self
            .queue
            .batch_get(&self.config.sheet_id, &self.config.sheet_name, indexes)
            .await?;

        log::info!("Processing {} rows", rows.len());
        let now = Local::now();
        for row in &mut rows {
            apply_catalog(row, catalog, now);
        }

        let free_rows: Vec<RowDirective> = rows
            .iter()
            .filter(|row| row.fill_in_is_run())
            .cloned()
            .collect();
        self.update_free_form_prices(&free_rows).await?;

        log::info!("Sheet updating");
        self.queue
            .batch_update(&self.config.sheet_id, &self.config.sheet_name, &rows)
            .await?;

        sleep_for(self.config.relax_each_batch).await;
        Ok(())
    }

    /// Resolve the free-form rows' target cells and write their prices,
    /// batched per target sheet. Unresolved rows lose their price update;
    /// that drop is logged, not retried.
    async fn update_free_form_prices(&self, rows: &[RowDirective]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        log::info!("Price sheet updating");
        let resolution = find_cells_to_update(&self.queue, rows).await?;
        if !resolution.unresolved.is_empty() {
            log::warn!(
                "No code match for rows {:?}, their price update is dropped",
                resolution.unresolved
            );
        }

        let mut batches: HashMap<(String, String), Vec<BatchCellUpdatePayload>> = HashMap::new();
        for row in rows {
            if let Some(target) = resolution.cells.get(&row.index) {
                batches
                    .entry((target.sheet_id.clone(), target.sheet_name.clone()))
                    .or_default()
                    .push(BatchCellUpdatePayload {
                        cell: target.cell.clone(),
                        value: Value::String(row.price.clone().unwrap_or_default()),
                    });
            }
        }
        for ((sheet_id, sheet_name), payloads) in batches {
            self.queue
                .free_style_batch_update(&sheet_id, &sheet_name, &payloads)
                .await?;
        }
        Ok(())
    }

    /// Operator-controlled inter-cycle pause, with the configured fallback
    /// when the cell is blank or unparsable.
    async fn read_relax_time(&self) -> Result<Duration> {
        let value = self
            .queue
            .get_cell_value(
                &self.config.sheet_id,
                &self.config.sheet_name,
                &self.config.relax_time_cell,
            )
            .await?;
        Ok(relax_duration(value.as_ref(), self.config.relax_each_round))
    }
}

/// Join one queue row against the catalog snapshot.
///
/// A hit fills price, game note and currency and stamps a success note; a
/// miss clears the price and stamps a note naming both identifiers.
pub fn apply_catalog(row: &mut RowDirective, catalog: &Catalog, now: DateTime<Local>) {
    let ts = formatted_datetime(now);
    let hit = catalog.get(&row.game).and_then(|entry| {
        entry
            .denominations
            .get(&row.denomination)
            .map(|price| (entry, price))
    });

    match hit {
        Some((entry, price)) => {
            row.price = Some(value_to_string(price));
            row.game_note = Some(entry.notes.clone());
            row.currency = Some(entry.currency.clone());
            row.note = Some(format!("{} Price updated successfully", ts));
        }
        None => {
            row.price = Some(String::new());
            row.note = Some(format!(
                "{} GAME: {} or DENOMINATION: {} is invalid",
                ts, row.game, row.denomination
            ));
        }
    }
}

/// One audit row per (game, denomination), indexes and sequence numbers
/// dense from the configured start. Deterministic for a given snapshot.
pub fn build_audit_rows(
    catalog: &Catalog,
    sheet_id: &str,
    sheet_name: &str,
    start_index: u32,
    now: DateTime<Local>,
) -> Vec<AuditRow> {
    let ts = formatted_datetime(now);
    let mut rows = Vec::new();
    for entry in catalog.iter() {
        for (denomination, price) in &entry.denominations {
            let n = rows.len() as u32;
            rows.push(AuditRow {
                sheet_id: sheet_id.to_string(),
                sheet_name: sheet_name.to_string(),
                index: start_index + n,
                stt: Some(n + 1),
                game: Some(entry.game.clone()),
                denomination: Some(denomination.clone()),
                price: Some(value_to_string(price)),
                updated_at: Some(ts.clone()),
            });
        }
    }
    rows
}

/// Parse the relax-cell value into a pause, falling back when blank or
/// unparsable.
pub fn relax_duration(cell: Option<&Value>, fallback: Duration) -> Duration {
    cell.map(value_to_string)
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|secs| *secs >= 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or(fallback)
}
