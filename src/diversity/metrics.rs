//! Dataset statistics for curated observation sets.
//!
//! Summarizes a set of observations by species distribution, quality,
//! temporal coverage and geographic extent, and measures how balanced the
//! species distribution is.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::observation::{partition_by_species, valid_coordinates, Observation};

/// Statistics for one species.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesStatistics {
    pub species_id: i64,
    pub name: String,
    pub count: usize,

    /// Mean of the scored members; absent if none were scored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_mean: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_std: Option<f64>,
}

/// Summary of quality scores (population standard deviation).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualitySummary {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

/// Date range and month histogram of dated observations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporalCoverage {
    pub earliest: String,
    pub latest: String,
    pub total_observations: usize,

    /// Keyed by the two-digit month of `observed_on`, `"00"` when it has none.
    pub by_month: BTreeMap<String, usize>,
}

/// Bounding box and centroid of located observations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeographicBounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
    pub centroid_lat: f64,
    pub centroid_lon: f64,
}

/// How observations are spread across species.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeciesDistribution {
    pub images_per_species_mean: f64,
    pub images_per_species_std: f64,
    pub images_per_species_min: usize,
    pub images_per_species_max: usize,

    /// Shannon entropy in nats.
    pub shannon_entropy: f64,

    /// Entropy divided by `ln(species)`, in `[0, 1]`.
    pub normalized_entropy: f64,

    /// 0 for perfectly balanced species counts.
    pub gini_coefficient: f64,
}

/// Statistics for a set of observations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetStatistics {
    /// Number of observations analyzed, identified or not.
    pub total_observations: usize,

    /// Number of distinct species ids.
    pub total_species: usize,

    /// Per-species statistics, largest species first.
    pub species: Vec<SpeciesStatistics>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualitySummary>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporal: Option<TemporalCoverage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub geographic: Option<GeographicBounds>,

    pub distribution: SpeciesDistribution,
}

impl DatasetStatistics {
    /// Calculates statistics for a set of observations.
    ///
    /// # Arguments
    ///
    /// * `observations` - The observations to analyze.
    ///
    /// # Returns
    ///
    /// `DatasetStatistics`; optional sections are `None` when no observation
    /// carries the underlying field.
    ///
    /// # Example
    ///
    /// ```
    /// use fauna_forge::diversity::DatasetStatistics;
    /// use fauna_forge::observation::Observation;
    ///
    /// let observations = vec![
    ///     Observation::new(1).with_species(100, "Species A"),
    ///     Observation::new(2).with_species(200, "Species B"),
    /// ];
    /// let stats = DatasetStatistics::calculate(&observations);
    /// assert_eq!(stats.total_species, 2);
    /// assert!((stats.distribution.normalized_entropy - 1.0).abs() < 1e-10);
    /// ```
    pub fn calculate(observations: &[Observation]) -> Self {
        let mut species: Vec<SpeciesStatistics> = partition_by_species(observations)
            .into_iter()
            .map(|partition| {
                let scores: Vec<f64> = partition
                    .members
                    .iter()
                    .filter_map(|obs| obs.quality_score)
                    .collect();
                SpeciesStatistics {
                    species_id: partition.species_id,
                    count: partition.len(),
                    name: partition.species_name,
                    quality_mean: mean(&scores),
                    quality_std: std_dev(&scores),
                }
            })
            .collect();
        species.sort_by_key(|s| Reverse(s.count));

        let counts: Vec<usize> = species.iter().map(|s| s.count).collect();

        Self {
            total_observations: observations.len(),
            total_species: species.len(),
            species,
            quality: Self::quality_summary(observations),
            temporal: Self::temporal_coverage(observations),
            geographic: Self::geographic_bounds(observations),
            distribution: Self::species_distribution(&counts),
        }
    }

    fn quality_summary(observations: &[Observation]) -> Option<QualitySummary> {
        let mut scores: Vec<f64> = observations.iter().filter_map(|o| o.quality_score).collect();
        if scores.is_empty() {
            return None;
        }
        scores.sort_by(f64::total_cmp);

        let mid = scores.len() / 2;
        let median = if scores.len() % 2 == 0 {
            (scores[mid - 1] + scores[mid]) / 2.0
        } else {
            scores[mid]
        };

        Some(QualitySummary {
            mean: mean(&scores)?,
            std: std_dev(&scores)?,
            min: scores[0],
            max: scores[scores.len() - 1],
            median,
        })
    }

    fn temporal_coverage(observations: &[Observation]) -> Option<TemporalCoverage> {
        let dates: Vec<&str> = observations
            .iter()
            .filter_map(|o| o.observed_on.as_deref())
            .filter(|d| !d.is_empty())
            .collect();

        let earliest = dates.iter().min()?.to_string();
        let latest = dates.iter().max()?.to_string();

        let mut by_month: BTreeMap<String, usize> = BTreeMap::new();
        for date in &dates {
            let month = date.split('-').nth(1).unwrap_or("00");
            *by_month.entry(month.to_string()).or_default() += 1;
        }

        Some(TemporalCoverage {
            earliest,
            latest,
            total_observations: dates.len(),
            by_month,
        })
    }

    fn geographic_bounds(observations: &[Observation]) -> Option<GeographicBounds> {
        let coords: Vec<_> = observations.iter().filter_map(valid_coordinates).collect();
        if coords.is_empty() {
            return None;
        }

        let lats: Vec<f64> = coords.iter().map(|c| c.latitude).collect();
        let lons: Vec<f64> = coords.iter().map(|c| c.longitude).collect();

        Some(GeographicBounds {
            north: lats.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            south: lats.iter().copied().fold(f64::INFINITY, f64::min),
            east: lons.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            west: lons.iter().copied().fold(f64::INFINITY, f64::min),
            centroid_lat: mean(&lats)?,
            centroid_lon: mean(&lons)?,
        })
    }

    fn species_distribution(counts: &[usize]) -> SpeciesDistribution {
        let as_f64: Vec<f64> = counts.iter().map(|&c| c as f64).collect();

        SpeciesDistribution {
            images_per_species_mean: mean(&as_f64).unwrap_or(0.0),
            images_per_species_std: std_dev(&as_f64).unwrap_or(0.0),
            images_per_species_min: counts.iter().copied().min().unwrap_or(0),
            images_per_species_max: counts.iter().copied().max().unwrap_or(0),
            shannon_entropy: shannon_entropy(counts),
            normalized_entropy: normalized_entropy(counts),
            gini_coefficient: gini_coefficient(counts),
        }
    }

    /// Returns a summary of the statistics as a formatted string.
    pub fn summary(&self) -> String {
        let rule = "=".repeat(60);
        let mut out = String::new();

        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "DATASET STATISTICS");
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "Total observations: {}", self.total_observations);
        let _ = writeln!(out, "Total species: {}", self.total_species);

        let d = &self.distribution;
        let _ = writeln!(out, "\n--- Distribution ---");
        let _ = writeln!(out, "  Images per species (mean): {:.1}", d.images_per_species_mean);
        let _ = writeln!(out, "  Images per species (std): {:.1}", d.images_per_species_std);
        let _ = writeln!(out, "  Images per species (min): {}", d.images_per_species_min);
        let _ = writeln!(out, "  Images per species (max): {}", d.images_per_species_max);
        let _ = writeln!(out, "  Normalized entropy: {:.3}", d.normalized_entropy);
        let _ = writeln!(out, "  Gini coefficient: {:.3}", d.gini_coefficient);

        if let Some(q) = &self.quality {
            let _ = writeln!(out, "\n--- Quality ---");
            let _ = writeln!(out, "  Mean: {:.1}", q.mean);
            let _ = writeln!(out, "  Std: {:.1}", q.std);
            let _ = writeln!(out, "  Range: [{:.1}, {:.1}]", q.min, q.max);
        }

        if let Some(t) = &self.temporal {
            let _ = writeln!(out, "\n--- Temporal Coverage ---");
            let _ = writeln!(out, "  Earliest: {}", t.earliest);
            let _ = writeln!(out, "  Latest: {}", t.latest);
        }

        if let Some(g) = &self.geographic {
            let _ = writeln!(out, "\n--- Geographic Coverage ---");
            let _ = writeln!(out, "  North: {:.4}", g.north);
            let _ = writeln!(out, "  South: {:.4}", g.south);
            let _ = writeln!(out, "  East: {:.4}", g.east);
            let _ = writeln!(out, "  West: {:.4}", g.west);
        }

        let _ = writeln!(out, "\n--- Species ---");
        for s in &self.species {
            match s.quality_mean {
                Some(q) => {
                    let _ = writeln!(out, "  {}: {} (q={:.1})", s.name, s.count, q);
                }
                None => {
                    let _ = writeln!(out, "  {}: {}", s.name, s.count);
                }
            }
        }
        out.push_str(&rule);

        out
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation.
fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Calculates Shannon entropy of a count distribution.
///
/// Higher entropy means a more uniform distribution (more diverse).
///
/// # Arguments
///
/// * `counts` - Count per category; zero counts are ignored.
///
/// # Returns
///
/// Shannon entropy in nats (natural logarithm base).
pub fn shannon_entropy(counts: &[usize]) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }

    let total_f = total as f64;

    counts
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / total_f;
            -p * p.ln()
        })
        .sum()
}

/// Calculates normalized entropy (0.0 to 1.0).
///
/// Normalized by the maximum possible entropy for the given number of categories.
pub fn normalized_entropy(counts: &[usize]) -> f64 {
    let entropy = shannon_entropy(counts);
    let max_entropy = (counts.len() as f64).ln();

    if max_entropy > 0.0 {
        (entropy / max_entropy).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Calculates the Gini coefficient of a count distribution.
///
/// 0 indicates perfect equality, values near 1 indicate that one category
/// holds almost everything.
pub fn gini_coefficient(counts: &[usize]) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }

    let mut values = counts.to_vec();
    values.sort_unstable();

    let n = values.len() as f64;
    let gini_sum: f64 = values
        .iter()
        .enumerate()
        .map(|(i, &value)| (2.0 * (i as f64 + 1.0) - n - 1.0) * value as f64)
        .sum();

    gini_sum / (n * total as f64)
}
