//! Error types for the glucolog crate

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GlucologError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Invalid reading: {0}")]
    Validation(String),

    #[error("No reading with id {0}")]
    NotFound(String),

    #[error("Health data access denied: {0}")]
    Permission(String),

    #[error("Import failed after {imported} of {fetched} records: {message}")]
    Import {
        message: String,
        imported: usize,
        fetched: usize,
    },
}
