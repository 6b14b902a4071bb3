//! Error types for price_sync

use thiserror::Error;

/// Unified error type for price_sync operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP error status code from an upstream service
    #[error("HTTP error: {0}")]
    HttpStatus(reqwest::StatusCode),
    /// Failed to parse a JSON payload
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// Cache file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Row schema has no column for the requested operation
    #[error("Sheet schema error: {0}")]
    SheetSchema(String),
    /// A fetched row does not satisfy its schema
    #[error("Validation error at row {index}: {message}")]
    RowValidation { index: u32, message: String },
    /// Malformed A1 cell or column reference
    #[error("Invalid cell reference: {0}")]
    CellRef(String),
    /// Missing or malformed environment configuration
    #[error("Config error: {0}")]
    Config(String),
    /// A spawned catalog fetch task panicked or was cancelled
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result alias for price_sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
