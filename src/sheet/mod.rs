//! Spreadsheet side: values client, column-mapped rows, cell resolution.

pub mod a1;
pub mod client;
pub mod resolve;
pub mod row;

pub use client::{SheetsClient, ValueInputOption, ValueRange};
pub use resolve::{find_cells_to_update, CellResolution, ResolvedCell};
pub use row::{
    AuditRow, BatchCellUpdatePayload, CheckFlag, ColumnSpec, NoteMessageUpdatePayload,
    RowDirective, SheetRow, WorkQueue,
};
