//! Observation data model and feature extraction.
//!
//! Observations are crowd-sourced sighting records. This module provides:
//!
//! 1. **Types** - the serde model of a record (taxon, coordinates, photos, engagement)
//! 2. **Features** - coordinate resolution and geo/temporal feature vectors
//! 3. **Partitioning** - grouping records by species in input order

pub mod features;
pub mod partition;
pub mod types;

pub use features::{
    approximate_day_of_year, calendar_day_of_year, extract_coordinates, has_valid_coordinates,
    observation_month, parse_observed_date, selection_features, spatiotemporal_features,
    valid_coordinates, Coordinates, DEFAULT_DAY_OF_YEAR, DEFAULT_MONTH,
};
pub use partition::{partition_by_species, SpeciesPartition};
pub use types::{
    Observation, ObservationId, Photo, PhotoDimensions, Taxon, DEFAULT_QUALITY_SCORE,
    UNKNOWN_SPECIES_NAME,
};
