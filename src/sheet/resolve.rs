//! Dynamic note-cell resolution for free-form rows.
//!
//! A free-form row names another sheet, a code column and a lookup code; the
//! write lands in the row's note column at whatever row the code matches.
//! Code columns are fetched once per (sheet, column) group. Rows whose code
//! never matches are left out of the write set but reported back so callers
//! can observe the drop.

use crate::error::Result;
use crate::sheet::a1;
use crate::sheet::row::{RowDirective, WorkQueue};
use crate::util::value_to_string;
use serde_json::Value;
use std::collections::HashMap;

/// Absolute target of one resolved write.
#[derive(Debug, Clone)]
pub struct ResolvedCell {
    pub sheet_id: String,
    pub sheet_name: String,
    pub cell: String,
}

/// Outcome of resolving a set of free-form rows, keyed by source row index.
#[derive(Debug, Default)]
pub struct CellResolution {
    pub cells: HashMap<u32, ResolvedCell>,
    pub unresolved: Vec<u32>,
}

/// Resolve the target cell of every routable row in `rows`.
///
/// Rows are grouped by (target sheet, code column) so each code column is
/// fetched exactly once.
pub async fn find_cells_to_update(
    queue: &WorkQueue,
    rows: &[RowDirective],
) -> Result<CellResolution> {
    let mut groups: HashMap<(String, String, String), Vec<(u32, String, String)>> = HashMap::new();
    for row in rows {
        let Some(routing) = row.routing() else {
            continue;
        };
        groups
            .entry((
                routing.sheet_id.to_string(),
                routing.sheet_name.to_string(),
                routing.code_column.to_string(),
            ))
            .or_default()
            .push((
                row.index,
                routing.code.to_string(),
                routing.note_column.to_string(),
            ));
    }

    let mut resolution = CellResolution::default();
    for ((sheet_id, sheet_name, code_column), wanted) in groups {
        let (letters, start_row) = a1::parse_col_ref(&code_column)?;
        let range = if start_row > 1 {
            format!("{}{}:{}", letters, start_row, letters)
        } else {
            format!("{}:{}", letters, letters)
        };
        let column = queue.column_values(&sheet_id, &sheet_name, &range).await?;

        let (resolved, unresolved) = scan_column(&column, start_row, &wanted)?;
        for (index, cell) in resolved {
            resolution.cells.insert(
                index,
                ResolvedCell {
                    sheet_id: sheet_id.clone(),
                    sheet_name: sheet_name.clone(),
                    cell,
                },
            );
        }
        resolution.unresolved.extend(unresolved);
    }
    resolution.unresolved.sort_unstable();
    Ok(resolution)
}

/// Match every wanted code against a fetched column.
///
/// `start_row` is the 1-based sheet row of `column[0]`. When a code appears
/// more than once the last match in scan order wins.
fn scan_column(
    column: &[Value],
    start_row: u32,
    wanted: &[(u32, String, String)],
) -> Result<(Vec<(u32, String)>, Vec<u32>)> {
    let mut resolved = Vec::new();
    let mut unresolved = Vec::new();

    for (index, code, note_column) in wanted {
        let (note_letters, _) = a1::parse_col_ref(note_column)?;
        let code = code.trim();

        let mut matched_row: Option<u32> = None;
        for (offset, value) in column.iter().enumerate() {
            if value_to_string(value).trim() == code {
                matched_row = Some(start_row + offset as u32);
            }
        }

        match matched_row {
            Some(row) => resolved.push((*index, format!("{}{}", note_letters, row))),
            None => unresolved.push(*index),
        }
    }

    Ok((resolved, unresolved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wanted(index: u32, code: &str, note_column: &str) -> (u32, String, String) {
        (index, code.to_string(), note_column.to_string())
    }

    #[test]
    fn resolves_exact_trimmed_match() {
        let column = vec![json!("A-1"), json!(" A-2 "), json!("A-3")];
        let (resolved, unresolved) =
            scan_column(&column, 1, &[wanted(5, "A-2", "N")]).unwrap();

        assert_eq!(resolved, vec![(5, "N2".to_string())]);
        assert!(unresolved.is_empty());
    }

    #[test]
    fn last_match_wins_on_duplicate_codes() {
        let column = vec![json!("A-2"), json!("A-1"), json!("A-2")];
        let (resolved, _) = scan_column(&column, 1, &[wanted(7, "A-2", "N")]).unwrap();

        assert_eq!(resolved, vec![(7, "N3".to_string())]);
    }

    #[test]
    fn no_match_reports_unresolved() {
        let column = vec![json!("A-1"), json!("A-2")];
        let (resolved, unresolved) =
            scan_column(&column, 1, &[wanted(4, "A-9", "N"), wanted(5, "A-1", "N")]).unwrap();

        assert_eq!(unresolved, vec![4]);
        assert_eq!(resolved, vec![(5, "N1".to_string())]);
    }

    #[test]
    fn start_row_offsets_the_resolved_cell() {
        // column fetched from row 5 down: P5:P
        let column = vec![json!("X"), json!("A-2")];
        let (resolved, _) = scan_column(&column, 5, &[wanted(3, "A-2", "N")]).unwrap();

        assert_eq!(resolved, vec![(3, "N6".to_string())]);
    }

    #[test]
    fn numeric_codes_are_coerced_before_comparison() {
        let column = vec![json!(1001), json!(1002)];
        let (resolved, _) = scan_column(&column, 1, &[wanted(2, "1002", "Q")]).unwrap();

        assert_eq!(resolved, vec![(2, "Q2".to_string())]);
    }
}
