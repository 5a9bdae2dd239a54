//! Error types for geotally.

use thiserror::Error;

/// Errors surfaced by the engine.
///
/// Per-record problems (non-finite coordinates, malformed rings) never reach
/// this type; they are skipped where they are found.
#[derive(Debug, Error)]
pub enum TallyError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Region source failed: {0}")]
    RegionSource(String),

    #[error("GeoJSON error: {0}")]
    GeoJson(String),
}

pub type Result<T> = std::result::Result<T, TallyError>;
