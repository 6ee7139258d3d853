//! Identity resolution and representative sampling for observation datasets.
//!
//! Crowd-sourced wildlife observations are heavily redundant: the same animal
//! is photographed by several people on the same afternoon, and popular
//! species dwarf rare ones. This module turns such a pool into a compact,
//! diverse training set.
//!
//! # Overview
//!
//! 1. **Clustering** - DBSCAN, k-means and feature scaling primitives
//! 2. **Deduplication** - Group observations of the same individual and keep the best
//! 3. **Sampling** - Select a bounded, diverse subset per species
//! 4. **Balancing** - Cap species at a uniform target
//! 5. **Metrics** - Describe the resulting dataset
//!
//! # Usage
//!
//! ## Deduplicating Observations
//!
//! ```rust,ignore
//! use fauna_forge::diversity::ObservationDeduplicator;
//!
//! // Observations within 100 m and 1 day are the same individual
//! let deduplicator = ObservationDeduplicator::new(100.0, 1.0);
//! let result = deduplicator.deduplicate(&observations);
//! println!("Kept {} of {} observations", result.total_unique, result.total_original);
//! ```
//!
//! ## Selecting Samples
//!
//! ```rust,ignore
//! use fauna_forge::diversity::{SampleSelector, SelectionMethod};
//!
//! let mut selector = SampleSelector::new(SelectionMethod::Clustering, 42);
//! let result = selector.select_samples(&candidates, 50, 10, 0.7, 0.3);
//! ```
//!
//! # Feature Spaces
//!
//! Deduplication clusters on latitude and longitude converted to meters plus
//! the calendar day of year scaled so that `temporal_threshold_days` spans the
//! same distance as `spatial_threshold_m`. Selection clusters on standardized
//! `(lat, lon, approximate day, quality)`.

pub mod balance;
pub mod clustering;
pub mod dedup;
pub mod metrics;
pub mod sampling;

// Re-export main types for convenience
pub use balance::balance_dataset;
pub use clustering::{euclidean_distance, standardize, Dbscan, KMeans, KMeansFit};
pub use dedup::{
    observation_score, DeduplicationParameters, DeduplicationResult, DeduplicationStats,
    ObservationDeduplicator, SpeciesDedupStats, UniqueIndividual,
};
pub use metrics::{
    gini_coefficient, normalized_entropy, shannon_entropy, DatasetStatistics, GeographicBounds,
    QualitySummary, SpeciesDistribution, SpeciesStatistics, TemporalCoverage,
};
pub use sampling::{
    SampleSelectionResult, SampleSelector, SelectionMethod, SelectionParameters, SelectionStats,
    DEFAULT_SEED,
};
