//! fauna-forge: curation core for crowd-sourced wildlife observation datasets.
//!
//! This library resolves which observations depict the same individual
//! animal, keeps the best-documented record of each, and selects a diverse,
//! bounded sample per species for training image classifiers.

// Core modules
pub mod cli;
pub mod diversity;
pub mod error;
pub mod observation;
pub mod pipeline;

// Re-export commonly used error types
pub use error::{ClusteringError, DatasetError};
