//! A1-notation helpers for column-mapped access.

use crate::error::{Result, SyncError};

/// 1-based column index to letters: 1 → "A", 27 → "AA".
pub fn column_letter(index: usize) -> String {
    let mut n = index;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Column letters to 1-based index: "A" → 1, "AA" → 27.
pub fn column_index(letters: &str) -> Result<usize> {
    if letters.is_empty() {
        return Err(SyncError::CellRef("empty column letters".to_string()));
    }
    let mut index = 0usize;
    for c in letters.chars() {
        let c = c.to_ascii_uppercase();
        if !c.is_ascii_uppercase() {
            return Err(SyncError::CellRef(format!(
                "invalid column letters: {}",
                letters
            )));
        }
        index = index * 26 + (c as usize - 'A' as usize + 1);
    }
    Ok(index)
}

/// Split a column reference like `"P"` or `"P5"` into its letters and the
/// 1-based row its range starts at (`1` when no row digits are given).
pub fn parse_col_ref(reference: &str) -> Result<(String, u32)> {
    let reference = reference.trim();
    let split = reference
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(reference.len());
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(SyncError::CellRef(format!(
            "invalid column reference: {}",
            reference
        )));
    }
    let start_row = if digits.is_empty() {
        1
    } else {
        digits
            .parse::<u32>()
            .map_err(|_| SyncError::CellRef(format!("invalid column reference: {}", reference)))?
            .max(1)
    };
    Ok((letters.to_ascii_uppercase(), start_row))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letter_basics() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(2), "B");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(52), "AZ");
    }

    #[test]
    fn column_index_inverts_column_letter() {
        for i in [1usize, 2, 25, 26, 27, 51, 52, 702, 703] {
            assert_eq!(column_index(&column_letter(i)).unwrap(), i);
        }
    }

    #[test]
    fn column_index_rejects_garbage() {
        assert!(column_index("").is_err());
        assert!(column_index("A1").is_err());
    }

    #[test]
    fn parse_col_ref_bare_letters_start_at_row_one() {
        assert_eq!(parse_col_ref("P").unwrap(), ("P".to_string(), 1));
        assert_eq!(parse_col_ref(" n ").unwrap(), ("N".to_string(), 1));
    }

    #[test]
    fn parse_col_ref_with_row_digits() {
        assert_eq!(parse_col_ref("P5").unwrap(), ("P".to_string(), 5));
        assert_eq!(parse_col_ref("AB12").unwrap(), ("AB".to_string(), 12));
    }

    #[test]
    fn parse_col_ref_rejects_garbage() {
        assert!(parse_col_ref("5P").is_err());
        assert!(parse_col_ref("").is_err());
    }
}
