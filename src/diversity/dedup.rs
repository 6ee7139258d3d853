//! Spatio-temporal deduplication of observations.
//!
//! Groups observations that probably depict the same individual animal,
//! based on geographic and temporal proximity within a species, and keeps
//! the best-documented observation of each group.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{NaiveDate, Utc};
use ndarray::Array2;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ClusteringError;
use crate::observation::{
    parse_observed_date, partition_by_species, spatiotemporal_features, valid_coordinates,
    Observation,
};

use super::clustering::Dbscan;

/// Default spatial threshold in meters.
const DEFAULT_SPATIAL_THRESHOLD_M: f64 = 100.0;

/// Default temporal threshold in days.
const DEFAULT_TEMPORAL_THRESHOLD_DAYS: f64 = 1.0;

/// Default minimum neighbourhood size for a cluster.
const DEFAULT_MIN_CLUSTER_SAMPLES: usize = 1;

/// Meters per degree of latitude.
const METERS_PER_DEGREE: f64 = 111_000.0;

/// Full-HD pixel count used to normalize photo resolution.
const REFERENCE_PIXELS: f64 = 1920.0 * 1080.0;

/// Dimensions assumed for a photo that reports none.
const FALLBACK_PHOTO_WIDTH: u64 = 640;
const FALLBACK_PHOTO_HEIGHT: u64 = 480;

/// Score weights of the best-observation heuristic.
const RESOLUTION_WEIGHT: f64 = 0.4;
const QUALITY_WEIGHT: f64 = 0.3;
const ENGAGEMENT_WEIGHT: f64 = 0.2;
const RECENCY_WEIGHT: f64 = 0.1;

/// Neutral component values used when the input is missing.
const NO_PHOTO_RESOLUTION_SCORE: f64 = 25.0;
const UNDATED_RECENCY_SCORE: f64 = 50.0;

/// A group of observations believed to depict one individual.
#[derive(Debug, Clone, Serialize)]
pub struct UniqueIndividual {
    /// `"{species_id}_{cluster_ordinal}"`, unique within a run.
    pub individual_id: String,

    /// Species name of the partition.
    pub species: String,

    /// Species identifier of the partition.
    pub species_id: i64,

    /// Every observation in the cluster, in input order.
    pub observations: Vec<Observation>,

    /// Representative observation kept downstream.
    pub best_observation: Observation,

    /// Number of members beyond the representative.
    pub n_duplicates: usize,

    /// Earliest and latest `observed_on` among members; empty strings if undated.
    pub date_range: (String, String),

    /// Mean latitude and longitude of members with valid coordinates.
    pub location_centroid: (f64, f64),
}

/// Per-species deduplication counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesDedupStats {
    /// Species name.
    pub name: String,

    /// Observations of the species in the input, valid coordinates or not.
    pub original: usize,

    /// Clusters emitted for the species.
    pub unique: usize,

    /// `original - unique`.
    pub removed: usize,

    /// `1 - unique / original`, or 0 when `original` is 0.
    pub dedup_rate: f64,
}

/// Result of a deduplication run.
#[derive(Debug, Clone, Serialize)]
pub struct DeduplicationResult {
    /// One entry per cluster across all species.
    pub unique_individuals: Vec<UniqueIndividual>,

    /// Number of observations passed in.
    pub total_original: usize,

    /// Number of unique individuals emitted.
    pub total_unique: usize,

    /// `total_original - total_unique`.
    pub duplicates_removed: usize,

    /// `1 - total_unique / total_original`, or 0 for empty input.
    pub dedup_rate: f64,

    /// Breakdown per clustered species.
    pub by_species: BTreeMap<i64, SpeciesDedupStats>,
}

impl DeduplicationResult {
    /// Returns an empty result.
    pub fn empty() -> Self {
        Self {
            unique_individuals: Vec::new(),
            total_original: 0,
            total_unique: 0,
            duplicates_removed: 0,
            dedup_rate: 0.0,
            by_species: BTreeMap::new(),
        }
    }

    /// The representative observation of every individual, in emission order.
    pub fn deduplicated_observations(&self) -> Vec<Observation> {
        self.unique_individuals
            .iter()
            .map(|individual| individual.best_observation.clone())
            .collect()
    }

    /// Builds the stats document persisted next to the deduplicated observations.
    pub fn stats(&self, parameters: DeduplicationParameters) -> DeduplicationStats {
        DeduplicationStats {
            total_original: self.total_original,
            total_unique: self.total_unique,
            duplicates_removed: self.duplicates_removed,
            dedup_rate: self.dedup_rate,
            by_species: self.by_species.clone(),
            parameters,
        }
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        let rule = "=".repeat(50);
        let mut out = String::new();

        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "DEDUPLICATION SUMMARY");
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "Total original observations: {}", self.total_original);
        let _ = writeln!(out, "Unique individuals identified: {}", self.total_unique);
        let _ = writeln!(out, "Duplicates removed: {}", self.duplicates_removed);
        let _ = writeln!(out, "Overall dedup rate: {:.1}%", self.dedup_rate * 100.0);
        let _ = writeln!(out);
        let _ = writeln!(out, "By species:");
        let _ = writeln!(out, "{}", "-".repeat(30));
        for stats in self.by_species.values() {
            let _ = writeln!(
                out,
                "  {}: {} -> {} ({:.1}% removed)",
                stats.name,
                stats.original,
                stats.unique,
                stats.dedup_rate * 100.0
            );
        }
        out.push_str(&rule);

        out
    }
}

/// Thresholds recorded alongside deduplication stats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeduplicationParameters {
    pub spatial_threshold_m: f64,
    pub temporal_threshold_days: f64,
    pub min_cluster_samples: usize,
}

/// Serializable summary of a deduplication run.
#[derive(Debug, Clone, Serialize)]
pub struct DeduplicationStats {
    pub total_original: usize,
    pub total_unique: usize,
    pub duplicates_removed: usize,
    pub dedup_rate: f64,
    pub by_species: BTreeMap<i64, SpeciesDedupStats>,
    pub parameters: DeduplicationParameters,
}

/// Deduplicator that clusters observations of the same individual.
///
/// Strategy, per species:
/// 1. Keep observations with valid coordinates
/// 2. DBSCAN over `(lat, lon, day_of_year)` scaled to meters
/// 3. Keep the best observation of each cluster
#[derive(Debug, Clone)]
pub struct ObservationDeduplicator {
    /// Maximum distance in meters between observations of one individual.
    spatial_threshold_m: f64,

    /// Maximum separation in days between observations of one individual.
    temporal_threshold_days: f64,

    /// Minimum neighbourhood size for DBSCAN core points.
    min_cluster_samples: usize,
}

impl Default for ObservationDeduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_SPATIAL_THRESHOLD_M, DEFAULT_TEMPORAL_THRESHOLD_DAYS)
    }
}

impl ObservationDeduplicator {
    /// Creates a new deduplicator.
    ///
    /// # Arguments
    ///
    /// * `spatial_threshold_m` - Distance in meters under which observations are duplicates.
    /// * `temporal_threshold_days` - Days between observations under which they are duplicates.
    ///
    /// # Example
    ///
    /// ```
    /// use fauna_forge::diversity::ObservationDeduplicator;
    ///
    /// let deduplicator = ObservationDeduplicator::new(200.0, 2.0);
    /// assert_eq!(deduplicator.spatial_threshold_m(), 200.0);
    /// ```
    pub fn new(spatial_threshold_m: f64, temporal_threshold_days: f64) -> Self {
        Self {
            spatial_threshold_m,
            temporal_threshold_days,
            min_cluster_samples: DEFAULT_MIN_CLUSTER_SAMPLES,
        }
    }

    /// Sets the minimum neighbourhood size for a cluster.
    pub fn with_min_cluster_samples(mut self, min_cluster_samples: usize) -> Self {
        self.min_cluster_samples = min_cluster_samples;
        self
    }

    /// Returns the spatial threshold in meters.
    pub fn spatial_threshold_m(&self) -> f64 {
        self.spatial_threshold_m
    }

    /// Returns the temporal threshold in days.
    pub fn temporal_threshold_days(&self) -> f64 {
        self.temporal_threshold_days
    }

    /// Returns the minimum cluster size.
    pub fn min_cluster_samples(&self) -> usize {
        self.min_cluster_samples
    }

    /// Returns the parameters for the stats document.
    pub fn parameters(&self) -> DeduplicationParameters {
        DeduplicationParameters {
            spatial_threshold_m: self.spatial_threshold_m,
            temporal_threshold_days: self.temporal_threshold_days,
            min_cluster_samples: self.min_cluster_samples,
        }
    }

    /// Deduplicates observations, scoring recency against today's date.
    pub fn deduplicate(&self, observations: &[Observation]) -> DeduplicationResult {
        self.deduplicate_as_of(observations, Utc::now().date_naive())
    }

    /// Deduplicates observations, scoring recency against `today`.
    ///
    /// # Arguments
    ///
    /// * `observations` - Observations of any number of species.
    /// * `today` - Reference date for the recency component.
    ///
    /// # Returns
    ///
    /// `DeduplicationResult` with one `UniqueIndividual` per cluster and
    /// per-species statistics.
    pub fn deduplicate_as_of(
        &self,
        observations: &[Observation],
        today: NaiveDate,
    ) -> DeduplicationResult {
        if observations.is_empty() {
            return DeduplicationResult::empty();
        }

        debug!(
            spatial_threshold_m = self.spatial_threshold_m,
            temporal_threshold_days = self.temporal_threshold_days,
            min_cluster_samples = self.min_cluster_samples,
            "Deduplicating {} observations",
            observations.len()
        );

        let mut unique_individuals = Vec::new();
        let mut by_species = BTreeMap::new();

        for partition in partition_by_species(observations) {
            let valid: Vec<&Observation> = partition
                .members
                .iter()
                .copied()
                .filter(|obs| valid_coordinates(obs).is_some())
                .collect();

            if valid.is_empty() {
                warn!(
                    species_id = partition.species_id,
                    "No valid coordinates for species {}, skipping", partition.species_name
                );
                continue;
            }

            if valid.len() < partition.len() {
                debug!(
                    species_id = partition.species_id,
                    "Excluded {} observations without valid coordinates",
                    partition.len() - valid.len()
                );
            }

            let clusters = self.cluster_observations(&valid);

            for (ordinal, members) in clusters.iter().enumerate() {
                let members: Vec<&Observation> = members.iter().map(|&i| valid[i]).collect();
                unique_individuals.push(build_individual(
                    partition.species_id,
                    &partition.species_name,
                    ordinal,
                    &members,
                    today,
                ));
            }

            let original = partition.len();
            let unique = clusters.len();
            let stats = SpeciesDedupStats {
                name: partition.species_name.clone(),
                original,
                unique,
                removed: original.saturating_sub(unique),
                dedup_rate: rate(unique, original),
            };

            info!(
                species_id = partition.species_id,
                "{}: {} -> {} ({:.1}% dedup)",
                stats.name,
                stats.original,
                stats.unique,
                stats.dedup_rate * 100.0
            );

            by_species.insert(partition.species_id, stats);
        }

        let total_original = observations.len();
        let total_unique = unique_individuals.len();

        DeduplicationResult {
            unique_individuals,
            total_original,
            total_unique,
            duplicates_removed: total_original.saturating_sub(total_unique),
            dedup_rate: rate(total_unique, total_original),
            by_species,
        }
    }

    /// Clusters observations that all carry valid coordinates.
    ///
    /// Returns member indices per cluster, clusters ordered by first member.
    /// Noise points become singletons; a clustering failure degrades to all
    /// singletons.
    fn cluster_observations(&self, observations: &[&Observation]) -> Vec<Vec<usize>> {
        if observations.len() < 2 {
            return vec![(0..observations.len()).collect()];
        }

        let labels = match self.cluster_labels(observations) {
            Ok(labels) => labels,
            Err(e) => {
                warn!("Clustering failed: {}. Treating all observations as unique.", e);
                return (0..observations.len()).map(|i| vec![i]).collect();
            }
        };

        let mut clusters: Vec<Vec<usize>> = Vec::new();
        let mut slot_of_label: BTreeMap<usize, usize> = BTreeMap::new();

        for (i, label) in labels.into_iter().enumerate() {
            match label {
                Some(label) => {
                    let slot = *slot_of_label.entry(label).or_insert_with(|| {
                        clusters.push(Vec::new());
                        clusters.len() - 1
                    });
                    clusters[slot].push(i);
                }
                None => clusters.push(vec![i]),
            }
        }

        clusters
    }

    /// Runs DBSCAN on features scaled so that both thresholds map to meters.
    fn cluster_labels(
        &self,
        observations: &[&Observation],
    ) -> Result<Vec<Option<usize>>, ClusteringError> {
        if !(self.spatial_threshold_m.is_finite() && self.spatial_threshold_m > 0.0) {
            return Err(ClusteringError::InvalidParameter(format!(
                "spatial_threshold_m must be positive, got {}",
                self.spatial_threshold_m
            )));
        }
        if !(self.temporal_threshold_days.is_finite() && self.temporal_threshold_days > 0.0) {
            return Err(ClusteringError::InvalidParameter(format!(
                "temporal_threshold_days must be positive, got {}",
                self.temporal_threshold_days
            )));
        }

        let mut features = Array2::<f64>::zeros((observations.len(), 3));
        for (i, obs) in observations.iter().enumerate() {
            let [lat, lon, day] = spatiotemporal_features(obs).unwrap_or([0.0, 0.0, 0.0]);
            features[[i, 0]] = lat;
            features[[i, 1]] = lon;
            features[[i, 2]] = day;
        }

        let mean_latitude = features.column(0).mean().unwrap_or(0.0);
        let lon_scale = METERS_PER_DEGREE * mean_latitude.to_radians().cos();
        let temporal_scale = self.spatial_threshold_m / self.temporal_threshold_days;

        features.column_mut(0).mapv_inplace(|lat| lat * METERS_PER_DEGREE);
        features.column_mut(1).mapv_inplace(|lon| lon * lon_scale);
        features.column_mut(2).mapv_inplace(|day| day * temporal_scale);

        let eps = (self.spatial_threshold_m.powi(2)
            + (self.temporal_threshold_days * temporal_scale).powi(2))
        .sqrt();

        Dbscan::new(eps, self.min_cluster_samples).fit(&features)
    }
}

/// Builds the `UniqueIndividual` for one cluster.
fn build_individual(
    species_id: i64,
    species_name: &str,
    ordinal: usize,
    members: &[&Observation],
    today: NaiveDate,
) -> UniqueIndividual {
    let best = select_best_observation(members, today);

    let dates: Vec<&str> = members
        .iter()
        .filter_map(|obs| obs.observed_on.as_deref())
        .filter(|d| !d.is_empty())
        .collect();
    let date_range = match (dates.iter().min(), dates.iter().max()) {
        (Some(first), Some(last)) => (first.to_string(), last.to_string()),
        _ => (String::new(), String::new()),
    };

    let coords: Vec<_> = members.iter().filter_map(|obs| valid_coordinates(obs)).collect();
    let location_centroid = if coords.is_empty() {
        (0.0, 0.0)
    } else {
        let n = coords.len() as f64;
        (
            coords.iter().map(|c| c.latitude).sum::<f64>() / n,
            coords.iter().map(|c| c.longitude).sum::<f64>() / n,
        )
    };

    UniqueIndividual {
        individual_id: format!("{}_{}", species_id, ordinal),
        species: species_name.to_string(),
        species_id,
        observations: members.iter().map(|&obs| obs.clone()).collect(),
        best_observation: best.clone(),
        n_duplicates: members.len().saturating_sub(1),
        date_range,
        location_centroid,
    }
}

/// Picks the highest-scoring member; the first one wins ties.
fn select_best_observation<'a>(members: &[&'a Observation], today: NaiveDate) -> &'a Observation {
    if members.len() == 1 {
        return members[0];
    }

    let mut best = members[0];
    let mut best_score = observation_score(best, today);
    for &candidate in &members[1..] {
        let score = observation_score(candidate, today);
        if score > best_score {
            best = candidate;
            best_score = score;
        }
    }
    best
}

/// Scores how well an observation documents its individual.
///
/// Criteria (by weight):
/// 1. Photo resolution of the first photo (40%)
/// 2. Visual quality score (30%)
/// 3. Engagement, favourites plus comments (20%)
/// 4. Recency relative to `today` (10%)
pub fn observation_score(observation: &Observation, today: NaiveDate) -> f64 {
    let resolution = match observation.primary_photo() {
        Some(photo) => {
            let dims = photo.original_dimensions.unwrap_or_default();
            let width = dims.width.unwrap_or(FALLBACK_PHOTO_WIDTH) as f64;
            let height = dims.height.unwrap_or(FALLBACK_PHOTO_HEIGHT) as f64;
            (width * height / REFERENCE_PIXELS * 100.0).min(100.0)
        }
        None => NO_PHOTO_RESOLUTION_SCORE,
    };

    let engagement = (observation.engagement() as f64 * 10.0).min(100.0);

    let recency = observation
        .observed_on
        .as_deref()
        .and_then(parse_observed_date)
        .map(|date| {
            let days_old = (today - date).num_days() as f64;
            (100.0 - days_old / 365.0 * 10.0).max(0.0)
        })
        .unwrap_or(UNDATED_RECENCY_SCORE);

    resolution * RESOLUTION_WEIGHT
        + observation.quality() * QUALITY_WEIGHT
        + engagement * ENGAGEMENT_WEIGHT
        + recency * RECENCY_WEIGHT
}

fn rate(unique: usize, original: usize) -> f64 {
    if original == 0 {
        return 0.0;
    }
    1.0 - unique as f64 / original as f64
}
