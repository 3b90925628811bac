//! Data directory and database path resolution

use std::path::PathBuf;

use crate::error::GlucologError;

/// OS-specific application data directory
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("glucolog")
}

/// Default location of the readings/settings database
pub fn default_database_path() -> PathBuf {
    data_dir().join("glucolog.db")
}

/// Create the data directory if it does not exist yet
pub fn ensure_data_dir() -> Result<PathBuf, GlucologError> {
    let dir = data_dir();
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
