//! Column-mapped row models and batched work-queue access.
//!
//! Each row type declares a constant column table; the generic [`WorkQueue`]
//! operations build ranged batch reads and writes from it. A fetched row that
//! fails validation never aborts its batch: the failure is written into the
//! row's note column and the row is dropped from the result.

use crate::error::{Result, SyncError};
use crate::retry::RetryPolicy;
use crate::sheet::a1;
use crate::sheet::client::{qualify_range, SheetsClient, ValueInputOption, ValueRange};
use crate::util::{coerce_cell, formatted_datetime, value_to_string};
use chrono::Local;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Sentinel values in the check column marking a row eligible for processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckFlag {
    Run,
}

impl CheckFlag {
    pub const RECOGNIZED: &'static [CheckFlag] = &[CheckFlag::Run];

    pub const fn as_str(self) -> &'static str {
        match self {
            CheckFlag::Run => "RUN",
        }
    }

    pub fn matches(value: &str) -> bool {
        Self::RECOGNIZED.iter().any(|flag| flag.as_str() == value)
    }
}

/// One field of a row type bound to a spreadsheet column.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub field: &'static str,
    pub column: &'static str,
    pub updatable: bool,
    pub note_sink: bool,
}

impl ColumnSpec {
    pub const fn input(field: &'static str, column: &'static str) -> Self {
        Self {
            field,
            column,
            updatable: false,
            note_sink: false,
        }
    }

    pub const fn updatable(field: &'static str, column: &'static str) -> Self {
        Self {
            field,
            column,
            updatable: true,
            note_sink: false,
        }
    }

    pub const fn note_sink(field: &'static str, column: &'static str) -> Self {
        Self {
            field,
            column,
            updatable: true,
            note_sink: true,
        }
    }
}

/// A row entity with a constant column mapping.
///
/// At most one column may be flagged as the note sink.
pub trait SheetRow: Sized {
    const COLUMNS: &'static [ColumnSpec];

    /// Build a row from coerced cells; the error string describes the
    /// validation failure for the note column.
    fn from_cells(
        sheet_id: &str,
        sheet_name: &str,
        index: u32,
        cells: &HashMap<&'static str, Option<String>>,
    ) -> std::result::Result<Self, String>;

    fn index(&self) -> u32;
    fn sheet_id(&self) -> &str;
    fn sheet_name(&self) -> &str;

    /// Serialized value for an updatable field.
    fn cell_value(&self, field: &'static str) -> Value;
}

/// Note text addressed to one row's note column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteMessageUpdatePayload {
    pub index: u32,
    pub message: String,
}

/// Arbitrary single-cell write for dynamically resolved targets.
#[derive(Debug, Clone)]
pub struct BatchCellUpdatePayload {
    pub cell: String,
    pub value: Value,
}

fn note_column<T: SheetRow>() -> Result<&'static ColumnSpec> {
    T::COLUMNS
        .iter()
        .find(|spec| spec.note_sink)
        .ok_or_else(|| SyncError::SheetSchema("row schema declares no note column".to_string()))
}

fn required(
    cells: &HashMap<&'static str, Option<String>>,
    field: &'static str,
) -> std::result::Result<String, String> {
    cells
        .get(field)
        .cloned()
        .flatten()
        .ok_or_else(|| format!("missing required field {}", field))
}

fn optional(cells: &HashMap<&'static str, Option<String>>, field: &'static str) -> Option<String> {
    cells.get(field).cloned().flatten()
}

fn opt_string(value: &Option<String>) -> Value {
    match value {
        Some(s) => Value::String(s.clone()),
        None => Value::Null,
    }
}

/// A work-queue row. Input columns identify the game and denomination to
/// price; output columns receive price, notes and currency. The routing
/// columns are only present on free-form rows whose note cell is resolved at
/// runtime via a code lookup.
#[derive(Debug, Clone)]
pub struct RowDirective {
    pub sheet_id: String,
    pub sheet_name: String,
    pub index: u32,

    pub check: String,
    pub product_name: Option<String>,
    pub pack: Option<String>,
    pub game: String,
    pub denomination: String,

    pub price: Option<String>,
    pub game_note: Option<String>,
    pub currency: Option<String>,
    pub note: Option<String>,

    pub fill_in: Option<String>,
    pub target_sheet_id: Option<String>,
    pub target_sheet_name: Option<String>,
    pub note_column: Option<String>,
    pub code: Option<String>,
    pub code_column: Option<String>,
}

/// Routing fields of a free-form row, present only when all of them are set.
#[derive(Debug, Clone, Copy)]
pub struct Routing<'a> {
    pub sheet_id: &'a str,
    pub sheet_name: &'a str,
    pub note_column: &'a str,
    pub code: &'a str,
    pub code_column: &'a str,
}

impl RowDirective {
    /// Routing fields for the free-form write path, or `None` when any of
    /// them is missing.
    pub fn routing(&self) -> Option<Routing<'_>> {
        Some(Routing {
            sheet_id: self.target_sheet_id.as_deref()?,
            sheet_name: self.target_sheet_name.as_deref()?,
            note_column: self.note_column.as_deref()?,
            code: self.code.as_deref()?,
            code_column: self.code_column.as_deref()?,
        })
    }

    /// The fill-in flag gates the free-form write-back.
    pub fn fill_in_is_run(&self) -> bool {
        self.fill_in.as_deref() == Some(CheckFlag::Run.as_str())
    }
}

impl SheetRow for RowDirective {
    const COLUMNS: &'static [ColumnSpec] = &[
        ColumnSpec::input("check", "B"),
        ColumnSpec::input("product_name", "C"),
        ColumnSpec::input("pack", "D"),
        ColumnSpec::input("game", "E"),
        ColumnSpec::input("denomination", "F"),
        ColumnSpec::updatable("price", "G"),
        ColumnSpec::updatable("game_note", "H"),
        ColumnSpec::updatable("currency", "I"),
        ColumnSpec::note_sink("note", "J"),
        ColumnSpec::input("fill_in", "K"),
        ColumnSpec::input("target_sheet_id", "L"),
        ColumnSpec::input("target_sheet_name", "M"),
        ColumnSpec::input("note_column", "N"),
        ColumnSpec::input("code", "O"),
        ColumnSpec::input("code_column", "P"),
    ];

    fn from_cells(
        sheet_id: &str,
        sheet_name: &str,
        index: u32,
        cells: &HashMap<&'static str, Option<String>>,
    ) -> std::result::Result<Self, String> {
        Ok(Self {
            sheet_id: sheet_id.to_string(),
            sheet_name: sheet_name.to_string(),
            index,
            check: required(cells, "check")?,
            product_name: optional(cells, "product_name"),
            pack: optional(cells, "pack"),
            game: required(cells, "game")?,
            denomination: required(cells, "denomination")?,
            price: optional(cells, "price"),
            game_note: optional(cells, "game_note"),
            currency: optional(cells, "currency"),
            note: optional(cells, "note"),
            fill_in: optional(cells, "fill_in"),
            target_sheet_id: optional(cells, "target_sheet_id"),
            target_sheet_name: optional(cells, "target_sheet_name"),
            note_column: optional(cells, "note_column"),
            code: optional(cells, "code"),
            code_column: optional(cells, "code_column"),
        })
    }

    fn index(&self) -> u32 {
        self.index
    }

    fn sheet_id(&self) -> &str {
        &self.sheet_id
    }

    fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    fn cell_value(&self, field: &'static str) -> Value {
        match field {
            "price" => opt_string(&self.price),
            "game_note" => opt_string(&self.game_note),
            "currency" => opt_string(&self.currency),
            "note" => opt_string(&self.note),
            _ => Value::Null,
        }
    }
}

/// One appended catalog audit row on the data sheet.
#[derive(Debug, Clone)]
pub struct AuditRow {
    pub sheet_id: String,
    pub sheet_name: String,
    pub index: u32,

    pub stt: Option<u32>,
    pub game: Option<String>,
    pub denomination: Option<String>,
    pub price: Option<String>,
    pub updated_at: Option<String>,
}

impl SheetRow for AuditRow {
    const COLUMNS: &'static [ColumnSpec] = &[
        ColumnSpec::updatable("stt", "A"),
        ColumnSpec::updatable("game", "B"),
        ColumnSpec::updatable("denomination", "C"),
        ColumnSpec::updatable("price", "D"),
        ColumnSpec::updatable("updated_at", "E"),
    ];

    fn from_cells(
        sheet_id: &str,
        sheet_name: &str,
        index: u32,
        cells: &HashMap<&'static str, Option<String>>,
    ) -> std::result::Result<Self, String> {
        let stt = match optional(cells, "stt") {
            Some(raw) => Some(
                raw.parse::<u32>()
                    .map_err(|_| format!("stt is not a number: {}", raw))?,
            ),
            None => None,
        };
        Ok(Self {
            sheet_id: sheet_id.to_string(),
            sheet_name: sheet_name.to_string(),
            index,
            stt,
            game: optional(cells, "game"),
            denomination: optional(cells, "denomination"),
            price: optional(cells, "price"),
            updated_at: optional(cells, "updated_at"),
        })
    }

    fn index(&self) -> u32 {
        self.index
    }

    fn sheet_id(&self) -> &str {
        &self.sheet_id
    }

    fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    fn cell_value(&self, field: &'static str) -> Value {
        match field {
            "stt" => self.stt.map(Value::from).unwrap_or(Value::Null),
            "game" => opt_string(&self.game),
            "denomination" => opt_string(&self.denomination),
            "price" => opt_string(&self.price),
            "updated_at" => opt_string(&self.updated_at),
            _ => Value::Null,
        }
    }
}

/// Batched, retry-wrapped access to the work queue and data sheets.
#[derive(Debug, Clone)]
pub struct WorkQueue {
    client: SheetsClient,
    write_retry: RetryPolicy,
    note_retry: RetryPolicy,
    read_retry: RetryPolicy,
}

impl WorkQueue {
    pub fn new(client: SheetsClient) -> Self {
        Self::with_retry(
            client,
            RetryPolicy::new(3, Duration::from_secs(30)),
            RetryPolicy::new(5, Duration::from_secs(30)),
            RetryPolicy::new(5, Duration::from_secs(10)),
        )
    }

    /// Custom retry bounds, used by tests to avoid real sleeps.
    pub fn with_retry(
        client: SheetsClient,
        write_retry: RetryPolicy,
        note_retry: RetryPolicy,
        read_retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            write_retry,
            note_retry,
            read_retry,
        }
    }

    /// Scan one column top to bottom and return the 1-based row numbers whose
    /// cell matches a recognized run flag. Non-string cells are coerced to
    /// strings before comparison.
    pub async fn get_run_indexes(
        &self,
        sheet_id: &str,
        sheet_name: &str,
        col_index: usize,
    ) -> Result<Vec<u32>> {
        let letters = a1::column_letter(col_index);
        let range = format!("{}:{}", letters, letters);
        let column = self
            .read_retry
            .run("get_run_indexes", || async {
                self.client.column_values(sheet_id, sheet_name, &range).await
            })
            .await?;

        Ok(column
            .iter()
            .enumerate()
            .filter(|(_, value)| CheckFlag::matches(&value_to_string(value)))
            .map(|(offset, _)| offset as u32 + 1)
            .collect())
    }

    /// Fetch one directive per index in a single batch request.
    ///
    /// Rows failing validation are excluded from the result; their errors are
    /// flushed as one batched note-column write before returning, so a bad
    /// row never blocks the batch and every failure is visible in-sheet.
    pub async fn batch_get<T: SheetRow>(
        &self,
        sheet_id: &str,
        sheet_name: &str,
        indexes: &[u32],
    ) -> Result<Vec<T>> {
        let mut cells = Vec::with_capacity(indexes.len() * T::COLUMNS.len());
        for index in indexes {
            for spec in T::COLUMNS {
                cells.push(format!("{}{}", spec.column, index));
            }
        }

        let results = self.client.batch_get(sheet_id, sheet_name, &cells).await?;

        let mut rows = Vec::new();
        let mut errors: Vec<NoteMessageUpdatePayload> = Vec::new();
        let mut cursor = 0;
        for &index in indexes {
            let mut fields: HashMap<&'static str, Option<String>> = HashMap::new();
            for spec in T::COLUMNS {
                fields.insert(
                    spec.field,
                    coerce_cell(results.get(cursor).and_then(|v| v.as_ref())),
                );
                cursor += 1;
            }
            match T::from_cells(sheet_id, sheet_name, index, &fields) {
                Ok(row) => rows.push(row),
                Err(message) => {
                    log::warn!("Row {} failed validation: {}", index, message);
                    errors.push(NoteMessageUpdatePayload {
                        index,
                        message: format!(
                            "{} Validation Error at row {}: {}",
                            formatted_datetime(Local::now()),
                            index,
                            message
                        ),
                    });
                }
            }
        }

        if !errors.is_empty() {
            self.batch_update_note_message::<T>(sheet_id, sheet_name, &errors)
                .await?;
        }

        Ok(rows)
    }

    /// Fetch a single row; a validation failure is returned as an error
    /// instead of being written to the sheet.
    pub async fn get_row<T: SheetRow>(
        &self,
        sheet_id: &str,
        sheet_name: &str,
        index: u32,
    ) -> Result<T> {
        let cells: Vec<String> = T::COLUMNS
            .iter()
            .map(|spec| format!("{}{}", spec.column, index))
            .collect();
        let results = self.client.batch_get(sheet_id, sheet_name, &cells).await?;

        let mut fields: HashMap<&'static str, Option<String>> = HashMap::new();
        for (i, spec) in T::COLUMNS.iter().enumerate() {
            fields.insert(spec.field, coerce_cell(results.get(i).and_then(|v| v.as_ref())));
        }
        T::from_cells(sheet_id, sheet_name, index, &fields)
            .map_err(|message| SyncError::RowValidation { index, message })
    }

    /// Write the updatable fields of every row as one batch call. No-op for
    /// an empty list.
    pub async fn batch_update<T: SheetRow>(
        &self,
        sheet_id: &str,
        sheet_name: &str,
        rows: &[T],
    ) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut data = Vec::new();
        for row in rows {
            for spec in T::COLUMNS.iter().filter(|spec| spec.updatable) {
                data.push(ValueRange {
                    range: qualify_range(sheet_name, &format!("{}{}", spec.column, row.index())),
                    values: vec![vec![row.cell_value(spec.field)]],
                });
            }
        }
        self.write_retry
            .run("batch_update", || async {
                self.client
                    .batch_update(sheet_id, &data, ValueInputOption::UserEntered)
                    .await
            })
            .await
    }

    /// Write one row's updatable fields back to its own sheet.
    pub async fn update_row<T: SheetRow>(&self, row: &T) -> Result<()> {
        let data: Vec<ValueRange> = T::COLUMNS
            .iter()
            .filter(|spec| spec.updatable)
            .map(|spec| ValueRange {
                range: qualify_range(
                    row.sheet_name(),
                    &format!("{}{}", spec.column, row.index()),
                ),
                values: vec![vec![row.cell_value(spec.field)]],
            })
            .collect();
        self.write_retry
            .run("update_row", || async {
                self.client
                    .batch_update(row.sheet_id(), &data, ValueInputOption::UserEntered)
                    .await
            })
            .await
    }

    /// Arbitrary cell writes for dynamically resolved targets.
    pub async fn free_style_batch_update(
        &self,
        sheet_id: &str,
        sheet_name: &str,
        payloads: &[BatchCellUpdatePayload],
    ) -> Result<()> {
        if payloads.is_empty() {
            return Ok(());
        }
        let data: Vec<ValueRange> = payloads
            .iter()
            .map(|payload| ValueRange {
                range: qualify_range(sheet_name, &payload.cell),
                values: vec![vec![payload.value.clone()]],
            })
            .collect();
        self.note_retry
            .run("free_style_batch_update", || async {
                self.client
                    .batch_update(sheet_id, &data, ValueInputOption::UserEntered)
                    .await
            })
            .await
    }

    /// Write one message into the row's note column.
    pub async fn update_note_message<T: SheetRow>(
        &self,
        sheet_id: &str,
        sheet_name: &str,
        index: u32,
        message: &str,
    ) -> Result<()> {
        let payload = NoteMessageUpdatePayload {
            index,
            message: message.to_string(),
        };
        self.batch_update_note_message::<T>(sheet_id, sheet_name, std::slice::from_ref(&payload))
            .await
    }

    /// Write every message into its row's note column as one batch call.
    /// Fails with a schema error if the row type declares no note sink.
    pub async fn batch_update_note_message<T: SheetRow>(
        &self,
        sheet_id: &str,
        sheet_name: &str,
        payloads: &[NoteMessageUpdatePayload],
    ) -> Result<()> {
        if payloads.is_empty() {
            return Ok(());
        }
        let note = note_column::<T>()?;
        let data: Vec<ValueRange> = payloads
            .iter()
            .map(|payload| ValueRange {
                range: qualify_range(sheet_name, &format!("{}{}", note.column, payload.index)),
                values: vec![vec![Value::String(payload.message.clone())]],
            })
            .collect();
        self.note_retry
            .run("batch_update_note_message", || async {
                self.client
                    .batch_update(sheet_id, &data, ValueInputOption::UserEntered)
                    .await
            })
            .await
    }

    /// Read one cell, unformatted. Used for the operator relax-time override.
    pub async fn get_cell_value(
        &self,
        sheet_id: &str,
        sheet_name: &str,
        cell: &str,
    ) -> Result<Option<Value>> {
        self.read_retry
            .run("get_cell_value", || async {
                self.client.get_cell(sheet_id, sheet_name, cell).await
            })
            .await
    }

    /// Fetch a full column range, retry-wrapped; used by cell resolution.
    pub async fn column_values(
        &self,
        sheet_id: &str,
        sheet_name: &str,
        col_range: &str,
    ) -> Result<Vec<Value>> {
        self.read_retry
            .run("column_values", || async {
                self.client
                    .column_values(sheet_id, sheet_name, col_range)
                    .await
            })
            .await
    }
}

#[cfg(test)]
#[path = "row_tests.rs"]
mod tests;
