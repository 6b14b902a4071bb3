//! Small shared helpers: chunking, timestamps, pacing, cell coercion.

use chrono::{DateTime, Local};
use serde_json::Value;
use std::time::Duration;

/// Split a list into chunks of at most `chunk_size` elements.
///
/// The last chunk may be shorter. Empty input yields no chunks.
pub fn split_list<T: Clone>(list: &[T], chunk_size: usize) -> Vec<Vec<T>> {
    list.chunks(chunk_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Format a timestamp the way it appears in note messages and audit rows.
pub fn formatted_datetime(now: DateTime<Local>) -> String {
    now.format("%d/%m/%Y %H:%M:%S").to_string()
}

/// Log and sleep for the given pacing delay.
pub async fn sleep_for(delay: Duration) {
    log::info!("Sleep for {:.1} seconds", delay.as_secs_f64());
    tokio::time::sleep(delay).await;
}

/// Render a sheet cell value as the string we write back or compare against.
///
/// Numbers keep their JSON rendering (`5.0` stays `"5.0"`), empty cells
/// become the empty string.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Coerce a fetched cell into the trimmed string form the row models consume.
///
/// A missing cell is `None`; everything else is stringified like
/// [`value_to_string`] and trimmed.
pub fn coerce_cell(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(v) => Some(value_to_string(v).trim().to_string()),
    }
}
