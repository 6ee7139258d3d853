//! Representative sample selection.
//!
//! Picks a bounded, diverse subset of observations per species from a
//! deduplicated candidate pool. Every strategy is deterministic for a given
//! seed and input order.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

use ndarray::Array2;
use ordered_float::OrderedFloat;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ClusteringError;
use crate::observation::{
    observation_month, partition_by_species, selection_features, valid_coordinates, Observation,
};

use super::clustering::{standardize, KMeans};

/// Default seed of the selection engine.
pub const DEFAULT_SEED: u64 = 42;

/// Number of k-means restarts.
const KMEANS_RESTARTS: usize = 10;

/// Added to the maximum coordinate so the top edge includes it.
const BIN_EDGE_EPSILON: f64 = 0.001;

/// Months in a year, used to derive time bins.
const MONTHS: usize = 12;

/// Available selection strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMethod {
    /// k-means in the geo/time/quality feature space, best member per cluster.
    #[default]
    Clustering,

    /// Geo/time grid, best members per cell.
    Stratified,

    /// Top-n by quality score.
    Quality,

    /// Uniform sample without replacement.
    Random,
}

impl SelectionMethod {
    /// Returns the method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMethod::Clustering => "clustering",
            SelectionMethod::Stratified => "stratified",
            SelectionMethod::Quality => "quality",
            SelectionMethod::Random => "random",
        }
    }

    /// Returns all methods.
    pub fn all() -> &'static [SelectionMethod] {
        &[
            SelectionMethod::Clustering,
            SelectionMethod::Stratified,
            SelectionMethod::Quality,
            SelectionMethod::Random,
        ]
    }
}

impl fmt::Display for SelectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SelectionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "clustering" => Ok(SelectionMethod::Clustering),
            "stratified" => Ok(SelectionMethod::Stratified),
            "quality" => Ok(SelectionMethod::Quality),
            "random" => Ok(SelectionMethod::Random),
            other => Err(format!(
                "Invalid selection method '{}'. Valid options: clustering, stratified, quality, random",
                other
            )),
        }
    }
}

/// Result of a selection run.
#[derive(Debug, Clone, Serialize)]
pub struct SampleSelectionResult {
    /// Selected observations, grouped by species in first-appearance order.
    pub selected: Vec<Observation>,

    /// Number of observations passed in.
    pub total_candidates: usize,

    /// Length of `selected`.
    pub total_selected: usize,

    /// Selected count per included species.
    pub by_species: BTreeMap<i64, usize>,

    /// Strategy that produced the selection.
    pub selection_method: SelectionMethod,
}

impl SampleSelectionResult {
    /// Builds the stats document persisted next to the selected observations.
    pub fn stats(&self, parameters: SelectionParameters) -> SelectionStats {
        SelectionStats {
            method: self.selection_method,
            total_candidates: self.total_candidates,
            total_selected: self.total_selected,
            by_species: self.by_species.clone(),
            parameters,
        }
    }

    /// Returns a human-readable summary, species ordered by count descending.
    pub fn summary(&self) -> String {
        let rule = "=".repeat(50);
        let mut out = String::new();

        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "SAMPLE SELECTION SUMMARY");
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "Method: {}", self.selection_method);
        let _ = writeln!(out, "Total candidates: {}", self.total_candidates);
        let _ = writeln!(out, "Total selected: {}", self.total_selected);
        let _ = writeln!(out, "Species included: {}", self.by_species.len());
        let _ = writeln!(out);
        let _ = writeln!(out, "By species:");

        let mut counts: Vec<(i64, usize)> = self.by_species.iter().map(|(&k, &v)| (k, v)).collect();
        counts.sort_by_key(|&(_, count)| Reverse(count));

        for (species_id, count) in counts {
            let name = self
                .selected
                .iter()
                .find(|obs| obs.species_id() == Some(species_id))
                .map(|obs| obs.species_name())
                .unwrap_or(crate::observation::UNKNOWN_SPECIES_NAME);
            let _ = writeln!(out, "  {}: {}", name, count);
        }
        out.push_str(&rule);

        out
    }
}

/// Parameters recorded alongside selection stats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SelectionParameters {
    pub samples_per_species: usize,
    pub min_samples_per_species: usize,
    pub diversity_weight: f64,
    pub quality_weight: f64,
    pub seed: u64,
}

/// Serializable summary of a selection run.
#[derive(Debug, Clone, Serialize)]
pub struct SelectionStats {
    pub method: SelectionMethod,
    pub total_candidates: usize,
    pub total_selected: usize,
    pub by_species: BTreeMap<i64, usize>,
    pub parameters: SelectionParameters,
}

/// Selects representative samples per species.
///
/// The engine owns its random generator, seeded at construction, so two
/// engines built with the same seed produce the same selections for the
/// same input order.
#[derive(Debug, Clone)]
pub struct SampleSelector {
    method: SelectionMethod,
    seed: u64,
    rng: ChaCha8Rng,
}

impl Default for SampleSelector {
    fn default() -> Self {
        Self::new(SelectionMethod::default(), DEFAULT_SEED)
    }
}

impl SampleSelector {
    /// Creates a new selector.
    ///
    /// # Arguments
    ///
    /// * `method` - Strategy applied to every species.
    /// * `seed` - Seed for the random generator and k-means initialisation.
    pub fn new(method: SelectionMethod, seed: u64) -> Self {
        Self {
            method,
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Returns the selection method.
    pub fn method(&self) -> SelectionMethod {
        self.method
    }

    /// Returns the seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Selects up to `n_samples_per_species` observations of every species.
    ///
    /// # Arguments
    ///
    /// * `observations` - Candidate pool, typically deduplicated and quality-scored.
    /// * `n_samples_per_species` - Upper bound per species.
    /// * `min_samples_per_species` - Species with fewer candidates are skipped.
    /// * `diversity_weight` - Accepted and clamped into `[0, 1]`; not applied.
    /// * `quality_weight` - Accepted and clamped into `[0, 1]`; not applied.
    ///
    /// # Returns
    ///
    /// `SampleSelectionResult` with the selected records and per-species counts.
    pub fn select_samples(
        &mut self,
        observations: &[Observation],
        n_samples_per_species: usize,
        min_samples_per_species: usize,
        diversity_weight: f64,
        quality_weight: f64,
    ) -> SampleSelectionResult {
        let diversity_weight = unit_weight("diversity_weight", diversity_weight);
        let quality_weight = unit_weight("quality_weight", quality_weight);

        debug!(
            method = %self.method,
            seed = self.seed,
            n_samples_per_species,
            min_samples_per_species,
            diversity_weight,
            quality_weight,
            "Selecting samples from {} candidates",
            observations.len()
        );

        let mut selected = Vec::new();
        let mut by_species = BTreeMap::new();

        for partition in partition_by_species(observations) {
            if partition.len() < min_samples_per_species {
                warn!(
                    species_id = partition.species_id,
                    "Species {} has only {} samples (min: {}), skipping",
                    partition.species_name,
                    partition.len(),
                    min_samples_per_species
                );
                continue;
            }

            let n = n_samples_per_species.min(partition.len());
            let indices = self.select_indices(&partition.members, n);

            info!(
                species_id = partition.species_id,
                "{}: selected {}/{} samples",
                partition.species_name,
                indices.len(),
                partition.len()
            );

            by_species.insert(partition.species_id, indices.len());
            selected.extend(indices.into_iter().map(|i| partition.members[i].clone()));
        }

        SampleSelectionResult {
            total_candidates: observations.len(),
            total_selected: selected.len(),
            selected,
            by_species,
            selection_method: self.method,
        }
    }

    fn select_indices(&mut self, members: &[&Observation], n: usize) -> Vec<usize> {
        match self.method {
            SelectionMethod::Clustering => self.clustering_sample(members, n),
            SelectionMethod::Stratified => stratified_sample(members, n),
            SelectionMethod::Quality => quality_sample(members, n),
            SelectionMethod::Random => self.random_sample(members.len(), n),
        }
    }

    /// Seeded uniform sampling without replacement.
    fn random_sample(&mut self, pool_size: usize, n: usize) -> Vec<usize> {
        if pool_size <= n {
            return (0..pool_size).collect();
        }

        let mut indices: Vec<usize> = (0..pool_size).collect();
        indices.shuffle(&mut self.rng);
        indices.truncate(n);
        indices
    }

    /// Cluster-based sampling.
    ///
    /// Algorithm:
    /// 1. Build `(lat, lon, day, quality)` features for members with coordinates
    /// 2. Standardize and run k-means with `n` clusters
    /// 3. Keep the highest-quality member of each cluster
    /// 4. Top up by quality if some clusters came out empty
    fn clustering_sample(&self, members: &[&Observation], n: usize) -> Vec<usize> {
        if members.len() <= n {
            return (0..members.len()).collect();
        }

        let mut located = Vec::with_capacity(members.len());
        let mut rows = Vec::with_capacity(members.len() * 4);
        for (i, obs) in members.iter().enumerate() {
            if let Some(features) = selection_features(obs) {
                located.push(i);
                rows.extend_from_slice(&features);
            }
        }

        if located.len() < n {
            debug!(
                "Only {} of {} candidates have coordinates, selecting by quality",
                located.len(),
                members.len()
            );
            return quality_sample(members, n);
        }

        let groups = match self.cluster_groups(rows, located.len(), n) {
            Ok(groups) => groups,
            Err(e) => {
                warn!("Clustering failed: {}. Falling back to quality.", e);
                return quality_sample(members, n);
            }
        };

        let mut selected: Vec<usize> = groups
            .iter()
            .filter_map(|group| best_by_quality(members, group.iter().map(|&row| located[row])))
            .collect();

        top_up_by_quality(members, &mut selected, n);
        selected.truncate(n);
        selected
    }

    fn cluster_groups(
        &self,
        rows: Vec<f64>,
        n_rows: usize,
        n_clusters: usize,
    ) -> Result<Vec<Vec<usize>>, ClusteringError> {
        let features = Array2::from_shape_vec((n_rows, 4), rows)
            .map_err(|e| ClusteringError::InvalidParameter(e.to_string()))?;
        let scaled = standardize(&features)?;

        let fit = KMeans::new(n_clusters, self.seed)
            .with_n_init(KMEANS_RESTARTS)
            .fit(&scaled)?;

        Ok(fit.groups())
    }
}

/// Clamps a weight into `[0, 1]`, warning when it was out of range.
fn unit_weight(name: &str, value: f64) -> f64 {
    if (0.0..=1.0).contains(&value) {
        return value;
    }
    let clamped = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    warn!("{} = {} is outside [0, 1], using {}", name, value, clamped);
    clamped
}

/// Member indices ordered by descending quality, ties in input order.
fn rank_by_quality(members: &[&Observation], candidates: impl Iterator<Item = usize>) -> Vec<usize> {
    let mut ranked: Vec<usize> = candidates.collect();
    ranked.sort_by_key(|&i| Reverse(OrderedFloat(members[i].quality())));
    ranked
}

/// Highest-quality candidate; the first one wins ties.
fn best_by_quality(members: &[&Observation], candidates: impl Iterator<Item = usize>) -> Option<usize> {
    rank_by_quality(members, candidates).first().copied()
}

/// Top-n by quality, ties in input order.
fn quality_sample(members: &[&Observation], n: usize) -> Vec<usize> {
    let mut ranked = rank_by_quality(members, 0..members.len());
    ranked.truncate(n);
    ranked
}

/// Fills `selected` up to `n` with the best members not yet chosen.
fn top_up_by_quality(members: &[&Observation], selected: &mut Vec<usize>, n: usize) {
    if selected.len() >= n {
        return;
    }

    let chosen: HashSet<usize> = selected.iter().copied().collect();
    let remaining = rank_by_quality(members, (0..members.len()).filter(|i| !chosen.contains(i)));
    let needed = n - selected.len();
    selected.extend(remaining.into_iter().take(needed));
}

/// Equal-width bins over `[min, max + epsilon)`.
#[derive(Debug, Clone, Copy)]
struct Bins {
    start: f64,
    width: f64,
    count: usize,
}

impl Bins {
    fn spanning(values: impl Iterator<Item = f64>, count: usize) -> Option<Self> {
        let (min, max) = values.fold(None, |acc: Option<(f64, f64)>, v| match acc {
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            None => Some((v, v)),
        })?;
        Some(Self {
            start: min,
            width: (max + BIN_EDGE_EPSILON - min) / count as f64,
            count,
        })
    }

    fn index(&self, value: f64) -> usize {
        let raw = ((value - self.start) / self.width).floor();
        if raw <= 0.0 {
            0
        } else {
            (raw as usize).min(self.count - 1)
        }
    }
}

type StratumKey = (Option<usize>, Option<usize>, usize);

/// Stratified sampling over a latitude x longitude x month grid.
///
/// Members without coordinates share a separate geographic stratum.
fn stratified_sample(members: &[&Observation], n: usize) -> Vec<usize> {
    if members.len() <= n {
        return (0..members.len()).collect();
    }

    let geo_bins = ((n as f64).sqrt().ceil() as usize).max(1);
    let time_bins = (n / geo_bins).max(1);

    let coords: Vec<_> = members.iter().map(|obs| valid_coordinates(obs)).collect();
    let lat_bins = Bins::spanning(coords.iter().flatten().map(|c| c.latitude), geo_bins);
    let lon_bins = Bins::spanning(coords.iter().flatten().map(|c| c.longitude), geo_bins);

    let mut strata: BTreeMap<StratumKey, Vec<usize>> = BTreeMap::new();
    for (i, obs) in members.iter().enumerate() {
        let geo = coords[i].and_then(|c| {
            Some((lat_bins?.index(c.latitude), lon_bins?.index(c.longitude)))
        });
        let month = observation_month(obs.observed_on.as_deref()).clamp(1, MONTHS as u32) as usize;
        let time_bin = ((month - 1) * time_bins / MONTHS).min(time_bins - 1);

        let key = (geo.map(|g| g.0), geo.map(|g| g.1), time_bin);
        strata.entry(key).or_default().push(i);
    }

    let per_stratum = (n / strata.len()).max(1);
    debug!(
        geo_bins,
        time_bins,
        strata = strata.len(),
        per_stratum,
        "Stratified selection grid"
    );

    let mut selected = Vec::with_capacity(n);
    for stratum in strata.into_values() {
        let ranked = rank_by_quality(members, stratum.into_iter());
        selected.extend(ranked.into_iter().take(per_stratum));
    }

    top_up_by_quality(members, &mut selected, n);
    selected.truncate(n);
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(id: i64, species_id: i64, lat: f64, lon: f64, quality: f64) -> Observation {
        Observation::new(id)
            .with_species(species_id, format!("Species {}", species_id))
            .with_coordinates(lat, lon)
            .with_observed_on("2023-06-15")
            .with_quality_score(quality)
    }

    /// Twelve observations of one species spread over a 3x4 grid.
    fn grid(species_id: i64, id_offset: i64) -> Vec<Observation> {
        (0..12)
            .map(|i| {
                obs(
                    id_offset + i,
                    species_id,
                    (i / 4) as f64,
                    (i % 4) as f64,
                    40.0 + (i * 7 % 12) as f64 * 5.0,
                )
            })
            .collect()
    }

    fn ids(result: &SampleSelectionResult) -> Vec<String> {
        result.selected.iter().map(|o| o.id.to_string()).collect()
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!("clustering".parse::<SelectionMethod>(), Ok(SelectionMethod::Clustering));
        assert_eq!("Stratified".parse::<SelectionMethod>(), Ok(SelectionMethod::Stratified));
        assert_eq!(" quality ".parse::<SelectionMethod>(), Ok(SelectionMethod::Quality));
        assert_eq!("random".parse::<SelectionMethod>(), Ok(SelectionMethod::Random));
        assert!("kmeans".parse::<SelectionMethod>().is_err());

        for method in SelectionMethod::all() {
            assert_eq!(method.to_string().parse::<SelectionMethod>(), Ok(*method));
        }
    }

    #[test]
    fn test_method_serde() {
        let json = serde_json::to_string(&SelectionMethod::Stratified).expect("serialize");
        assert_eq!(json, "\"stratified\"");
        let back: SelectionMethod = serde_json::from_str("\"random\"").expect("deserialize");
        assert_eq!(back, SelectionMethod::Random);
    }

    #[test]
    fn test_selector_default() {
        let selector = SampleSelector::default();
        assert_eq!(selector.method(), SelectionMethod::Clustering);
        assert_eq!(selector.seed(), DEFAULT_SEED);
    }

    #[test]
    fn test_quality_top_n_with_stable_ties() {
        let observations = vec![
            obs(1, 100, 0.0, 0.0, 60.0),
            obs(2, 100, 0.0, 0.0, 90.0),
            obs(3, 100, 0.0, 0.0, 60.0),
            obs(4, 100, 0.0, 0.0, 90.0),
            obs(5, 100, 0.0, 0.0, 30.0),
        ];
        let mut selector = SampleSelector::new(SelectionMethod::Quality, 42);
        let result = selector.select_samples(&observations, 3, 1, 0.7, 0.3);

        assert_eq!(ids(&result), vec!["2", "4", "1"]);
    }

    #[test]
    fn test_unscored_default_to_fifty() {
        let observations = vec![
            obs(1, 100, 0.0, 0.0, 40.0),
            Observation::new(2).with_species(100, "Species 100"),
            obs(3, 100, 0.0, 0.0, 55.0),
        ];
        let mut selector = SampleSelector::new(SelectionMethod::Quality, 42);
        let result = selector.select_samples(&observations, 2, 1, 0.7, 0.3);

        assert_eq!(ids(&result), vec!["3", "2"]);
    }

    #[test]
    fn test_species_below_minimum_skipped() {
        let mut observations = grid(100, 0);
        observations.extend(vec![obs(100, 200, 0.0, 0.0, 99.0), obs(101, 200, 1.0, 1.0, 99.0)]);

        for method in SelectionMethod::all() {
            let mut selector = SampleSelector::new(*method, 42);
            let result = selector.select_samples(&observations, 5, 3, 0.7, 0.3);

            assert_eq!(result.total_candidates, 14);
            assert!(!result.by_species.contains_key(&200));
            assert!(result.selected.iter().all(|o| o.species_id() == Some(100)));
        }
    }

    #[test]
    fn test_never_exceeds_per_species_cap() {
        let mut observations = grid(100, 0);
        observations.extend(grid(200, 100));

        for method in SelectionMethod::all() {
            let mut selector = SampleSelector::new(*method, 7);
            let result = selector.select_samples(&observations, 5, 1, 0.7, 0.3);

            assert_eq!(result.by_species[&100], 5, "{}", method);
            assert_eq!(result.by_species[&200], 5, "{}", method);
            assert_eq!(result.total_selected, 10);

            let unique: HashSet<String> = ids(&result).into_iter().collect();
            assert_eq!(unique.len(), 10, "{} selected a record twice", method);
        }
    }

    #[test]
    fn test_small_species_kept_whole() {
        let observations = grid(100, 0);
        for method in SelectionMethod::all() {
            let mut selector = SampleSelector::new(*method, 42);
            let result = selector.select_samples(&observations, 50, 1, 0.7, 0.3);
            assert_eq!(result.total_selected, 12);
        }
    }

    #[test]
    fn test_deterministic_across_instances() {
        let mut observations = grid(100, 0);
        observations.extend(grid(200, 100));

        for method in SelectionMethod::all() {
            let first = SampleSelector::new(*method, 1234).select_samples(&observations, 4, 1, 0.7, 0.3);
            let second = SampleSelector::new(*method, 1234).select_samples(&observations, 4, 1, 0.7, 0.3);
            assert_eq!(ids(&first), ids(&second), "{} is not deterministic", method);
        }
    }

    #[test]
    fn test_random_generator_advances_between_calls() {
        let observations: Vec<Observation> = (0..40).map(|i| obs(i, 100, 0.0, 0.0, 50.0)).collect();
        let mut selector = SampleSelector::new(SelectionMethod::Random, 42);

        let first = selector.select_samples(&observations, 10, 1, 0.7, 0.3);
        let second = selector.select_samples(&observations, 10, 1, 0.7, 0.3);
        assert_ne!(ids(&first), ids(&second));

        let mut replay = SampleSelector::new(SelectionMethod::Random, 42);
        assert_eq!(ids(&replay.select_samples(&observations, 10, 1, 0.7, 0.3)), ids(&first));
    }

    #[test]
    fn test_clustering_spreads_across_locations() {
        let mut observations = Vec::new();
        for (blob, (lat, lon)) in [(0.0, 0.0), (10.0, 10.0), (20.0, -10.0)].iter().enumerate() {
            for j in 0..4 {
                let offset = j as f64 * 0.001;
                observations.push(obs((blob * 4 + j) as i64, 100, lat + offset, lon + offset, 50.0));
            }
        }

        let mut selector = SampleSelector::new(SelectionMethod::Clustering, 42);
        let result = selector.select_samples(&observations, 3, 1, 0.7, 0.3);

        assert_eq!(result.total_selected, 3);
        let mut blobs: Vec<i64> = result
            .selected
            .iter()
            .map(|o| match o.id {
                crate::observation::ObservationId::Number(id) => id / 4,
                _ => -1,
            })
            .collect();
        blobs.sort_unstable();
        assert_eq!(blobs, vec![0, 1, 2]);
    }

    #[test]
    fn test_clustering_falls_back_to_quality_without_coordinates() {
        let mut observations: Vec<Observation> = (0..6)
            .map(|i| {
                Observation::new(i)
                    .with_species(100, "Species 100")
                    .with_quality_score(i as f64 * 10.0)
            })
            .collect();
        observations.push(obs(6, 100, 0.0, 0.0, 5.0));

        let mut selector = SampleSelector::new(SelectionMethod::Clustering, 42);
        let result = selector.select_samples(&observations, 3, 1, 0.7, 0.3);

        assert_eq!(ids(&result), vec!["5", "4", "3"]);
    }

    #[test]
    fn test_best_by_quality_keeps_first_on_ties() {
        let members_owned = vec![
            obs(1, 100, 0.0, 0.0, 70.0),
            obs(2, 100, 0.0, 0.0, 80.0),
            obs(3, 100, 0.0, 0.0, 80.0),
        ];
        let members: Vec<&Observation> = members_owned.iter().collect();

        assert_eq!(best_by_quality(&members, 0..3), Some(1));
        assert_eq!(best_by_quality(&members, [0usize].into_iter()), Some(0));
        assert_eq!(best_by_quality(&members, std::iter::empty()), None);
    }

    #[test]
    fn test_stratified_takes_best_of_each_cell() {
        let mut observations = Vec::new();
        let corners = [(0.0, 0.0), (0.0, 10.0), (10.0, 0.0), (10.0, 10.0)];
        for (c, (lat, lon)) in corners.iter().enumerate() {
            for j in 0..3 {
                let id = (c * 3 + j) as i64;
                let quality = if j == 1 { 90.0 } else { 40.0 };
                observations.push(obs(id, 100, *lat, *lon, quality));
            }
        }

        let mut selector = SampleSelector::new(SelectionMethod::Stratified, 42);
        let result = selector.select_samples(&observations, 4, 1, 0.7, 0.3);

        assert_eq!(ids(&result), vec!["1", "4", "7", "10"]);
    }

    #[test]
    fn test_stratified_single_cell() {
        let observations: Vec<Observation> = (0..8)
            .map(|i| obs(i, 100, 5.0, 5.0, (i * 10) as f64))
            .collect();

        let mut selector = SampleSelector::new(SelectionMethod::Stratified, 42);
        let result = selector.select_samples(&observations, 3, 1, 0.7, 0.3);

        assert_eq!(ids(&result), vec!["7", "6", "5"]);
    }

    #[test]
    fn test_stratified_tops_up_by_quality() {
        // Two cells with a quota of two each; the sparse cell only has one.
        let mut observations: Vec<Observation> = (0..5)
            .map(|i| obs(i, 100, 0.0, 0.0, 10.0 + (i * 10) as f64))
            .collect();
        observations.push(obs(5, 100, 10.0, 0.0, 5.0));

        let mut selector = SampleSelector::new(SelectionMethod::Stratified, 42);
        let result = selector.select_samples(&observations, 4, 1, 0.7, 0.3);

        assert_eq!(ids(&result), vec!["4", "3", "5", "2"]);
    }

    #[test]
    fn test_stratified_splits_by_season() {
        // Co-located, so only the month separates them: n=4 gives two
        // geographic and two time bins (January-June, July-December).
        let dated = [
            (0, "2023-02-10", 90.0),
            (1, "2023-03-10", 80.0),
            (2, "2023-04-10", 70.0),
            (3, "2023-09-10", 30.0),
            (4, "2023-10-10", 20.0),
            (5, "2023-11-10", 10.0),
        ];
        let observations: Vec<Observation> = dated
            .iter()
            .map(|&(id, date, quality)| obs(id, 100, 5.0, 5.0, quality).with_observed_on(date))
            .collect();

        let mut selector = SampleSelector::new(SelectionMethod::Stratified, 42);
        let result = selector.select_samples(&observations, 4, 1, 0.7, 0.3);

        // Each half of the year contributes its two best records.
        assert_eq!(ids(&result), vec!["0", "1", "3", "4"]);

        let by_quality = SampleSelector::new(SelectionMethod::Quality, 42)
            .select_samples(&observations, 4, 1, 0.7, 0.3);
        assert_eq!(ids(&by_quality), vec!["0", "1", "2", "3"]);
    }

    #[test]
    fn test_stratified_separates_unlocated() {
        let mut observations: Vec<Observation> = (0..4)
            .map(|i| obs(i, 100, 1.0, 1.0, 80.0 + i as f64))
            .collect();
        observations.extend((4..8).map(|i| {
            Observation::new(i)
                .with_species(100, "Species 100")
                .with_quality_score(10.0)
        }));

        let mut selector = SampleSelector::new(SelectionMethod::Stratified, 42);
        let result = selector.select_samples(&observations, 2, 1, 0.7, 0.3);

        // The unlocated stratum sorts first and contributes its best record.
        assert_eq!(ids(&result), vec!["4", "3"]);
    }

    #[test]
    fn test_bins_include_maximum() {
        let bins = Bins::spanning([0.0, 5.0, 10.0].into_iter(), 2).expect("bins");
        assert_eq!(bins.index(0.0), 0);
        assert_eq!(bins.index(4.9), 0);
        assert_eq!(bins.index(10.0), 1);
        assert_eq!(bins.index(-1.0), 0);
        assert!(Bins::spanning(std::iter::empty(), 2).is_none());
    }

    #[test]
    fn test_weights_do_not_change_selection() {
        let observations = grid(100, 0);
        let baseline = SampleSelector::new(SelectionMethod::Clustering, 42)
            .select_samples(&observations, 4, 1, 0.7, 0.3);
        let reweighted = SampleSelector::new(SelectionMethod::Clustering, 42)
            .select_samples(&observations, 4, 1, 5.0, -1.0);
        assert_eq!(ids(&baseline), ids(&reweighted));
    }

    #[test]
    fn test_unit_weight() {
        assert_eq!(unit_weight("w", 0.7), 0.7);
        assert_eq!(unit_weight("w", 1.5), 1.0);
        assert_eq!(unit_weight("w", -0.2), 0.0);
        assert_eq!(unit_weight("w", f64::NAN), 0.0);
    }

    #[test]
    fn test_summary_and_stats() {
        let mut observations = grid(100, 0);
        observations.extend(grid(200, 100).into_iter().take(6));

        let mut selector = SampleSelector::new(SelectionMethod::Quality, 42);
        let result = selector.select_samples(&observations, 8, 1, 0.7, 0.3);

        let summary = result.summary();
        assert!(summary.contains("SAMPLE SELECTION SUMMARY"));
        assert!(summary.contains("Method: quality"));
        assert!(summary.contains("Species included: 2"));
        let first = summary.find("Species 100: 8").expect("species 100 line");
        let second = summary.find("Species 200: 6").expect("species 200 line");
        assert!(first < second);

        let stats = serde_json::to_value(result.stats(SelectionParameters {
            samples_per_species: 8,
            min_samples_per_species: 1,
            diversity_weight: 0.7,
            quality_weight: 0.3,
            seed: 42,
        }))
        .expect("serialize");
        assert_eq!(stats["method"], "quality");
        assert_eq!(stats["by_species"]["200"], 6);
        assert_eq!(stats["parameters"]["samples_per_species"], 8);
    }
}
