//! Error types for fauna-forge operations.
//!
//! Defines error types for the subsystems that can fail:
//! - Numerical clustering and partitioning (recovered inside the engines)
//! - Loading and writing observation datasets

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the clustering primitives (DBSCAN, k-means, scaling).
///
/// The deduplication and selection engines never surface these to callers;
/// they log them and switch to their fallback step instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClusteringError {
    #[error("Cannot cluster an empty feature matrix")]
    EmptyInput,

    #[error("Non-finite feature value at row {row}, column {column}")]
    NonFiniteFeature { row: usize, column: usize },

    #[error("Invalid clustering parameter: {0}")]
    InvalidParameter(String),

    #[error("Requested {clusters} clusters but only {points} points are available")]
    TooFewPoints { points: usize, clusters: usize },

    #[error("Clustering diverged: {0}")]
    Diverged(String),
}

/// Errors that can occur while reading or writing observation datasets.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Observations file not found: {0}")]
    NotFound(PathBuf),

    #[error("No observations file found in {0}; run the previous pipeline stages first")]
    NoInput(PathBuf),

    #[error("Failed to parse observations in '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
