//! Error types for mapcluster.
//!
//! Absent features and unknown clusters are reported as `false` by the
//! operations that look them up, never as errors.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MapError>;

#[derive(Debug, Error)]
pub enum MapError {
    /// Argument rejected before any mutation took place.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid GeoJSON: {0}")]
    InvalidGeoJson(String),
}
