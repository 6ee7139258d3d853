//! Clustering primitives over feature matrices.
//!
//! Provides the numeric building blocks used by deduplication and sample
//! selection: distance helpers, per-column standardization, density-based
//! clustering (DBSCAN) and centroid-based partitioning (k-means).
//!
//! Every routine validates its input and reports numerical problems as a
//! [`ClusteringError`] so callers can switch to their fallback path.

use std::collections::VecDeque;

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::seq::IndexedRandom;
use rand::{RngExt, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::ClusteringError;

/// Default number of k-means restarts; the lowest-inertia run wins.
const DEFAULT_N_INIT: usize = 10;

/// Default iteration cap for a single k-means run.
const DEFAULT_MAX_ITER: usize = 300;

/// Default relative convergence tolerance for k-means.
const DEFAULT_TOLERANCE: f64 = 1e-4;

/// Computes the Euclidean distance between two vectors.
///
/// # Arguments
///
/// * `a` - First vector.
/// * `b` - Second vector.
pub fn euclidean_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    squared_distance(a, b).sqrt()
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

/// Checks that a feature matrix is non-empty and fully finite.
pub fn ensure_finite(features: &Array2<f64>) -> Result<(), ClusteringError> {
    if features.nrows() == 0 {
        return Err(ClusteringError::EmptyInput);
    }

    for ((row, column), value) in features.indexed_iter() {
        if !value.is_finite() {
            return Err(ClusteringError::NonFiniteFeature { row, column });
        }
    }

    Ok(())
}

/// Standardizes each column to zero mean and unit variance.
///
/// Uses the population standard deviation. Columns with zero variance are
/// only centered.
pub fn standardize(features: &Array2<f64>) -> Result<Array2<f64>, ClusteringError> {
    ensure_finite(features)?;

    let mean = features
        .mean_axis(Axis(0))
        .ok_or(ClusteringError::EmptyInput)?;
    let scale: Array1<f64> = features
        .std_axis(Axis(0), 0.0)
        .mapv(|s| if s > 0.0 && s.is_finite() { s } else { 1.0 });

    let scaled = (features - &mean) / &scale;
    ensure_finite(&scaled)?;
    Ok(scaled)
}

/// Density-based clustering (DBSCAN).
///
/// A point with at least `min_samples` points (itself included) within
/// distance `eps` is a core point. Clusters are grown from core points;
/// points reachable from no core point are noise.
#[derive(Debug, Clone, Copy)]
pub struct Dbscan {
    /// Neighbourhood radius, inclusive.
    eps: f64,

    /// Neighbourhood size required for a core point.
    min_samples: usize,
}

impl Dbscan {
    /// Creates a DBSCAN instance.
    ///
    /// # Arguments
    ///
    /// * `eps` - Neighbourhood radius, in feature units.
    /// * `min_samples` - Minimum neighbourhood size for a core point.
    pub fn new(eps: f64, min_samples: usize) -> Self {
        Self { eps, min_samples }
    }

    /// Clusters the rows of `features`.
    ///
    /// # Returns
    ///
    /// One label per row: `Some(cluster)` with clusters numbered in order of
    /// discovery, or `None` for noise.
    ///
    /// # Errors
    ///
    /// Returns `ClusteringError` if `eps` is not a positive finite number,
    /// `min_samples` is zero, or the features are empty or non-finite.
    pub fn fit(&self, features: &Array2<f64>) -> Result<Vec<Option<usize>>, ClusteringError> {
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(ClusteringError::InvalidParameter(format!(
                "eps must be positive and finite, got {}",
                self.eps
            )));
        }
        if self.min_samples == 0 {
            return Err(ClusteringError::InvalidParameter(
                "min_samples must be at least 1".to_string(),
            ));
        }
        ensure_finite(features)?;

        let n = features.nrows();
        let region = |i: usize| -> Vec<usize> {
            (0..n)
                .filter(|&j| euclidean_distance(features.row(i), features.row(j)) <= self.eps)
                .collect()
        };

        let mut labels: Vec<Option<usize>> = vec![None; n];
        let mut visited = vec![false; n];
        let mut next_cluster = 0;

        for i in 0..n {
            if visited[i] {
                continue;
            }
            visited[i] = true;

            let seeds = region(i);
            if seeds.len() < self.min_samples {
                continue;
            }

            let cluster = next_cluster;
            next_cluster += 1;
            labels[i] = Some(cluster);

            let mut queue: VecDeque<usize> = seeds.into_iter().filter(|&j| j != i).collect();
            while let Some(j) = queue.pop_front() {
                // Border points keep the first cluster that reaches them.
                if labels[j].is_none() {
                    labels[j] = Some(cluster);
                }
                if visited[j] {
                    continue;
                }
                visited[j] = true;

                let neighbours = region(j);
                if neighbours.len() >= self.min_samples {
                    queue.extend(neighbours.into_iter().filter(|&k| labels[k].is_none() || !visited[k]));
                }
            }
        }

        Ok(labels)
    }
}

/// Result of a k-means fit.
#[derive(Debug, Clone)]
pub struct KMeansFit {
    /// Cluster index of every row.
    pub labels: Vec<usize>,

    /// Final centroids, one row per cluster.
    pub centroids: Array2<f64>,

    /// Sum of squared distances of rows to their centroid.
    pub inertia: f64,
}

impl KMeansFit {
    /// Returns the member row indices of each cluster, including empty clusters.
    pub fn groups(&self) -> Vec<Vec<usize>> {
        let mut groups = vec![Vec::new(); self.centroids.nrows()];
        for (row, &label) in self.labels.iter().enumerate() {
            groups[label].push(row);
        }
        groups
    }
}

/// Centroid-based partitioning (Lloyd's k-means with k-means++ seeding).
///
/// Runs `n_init` seeded restarts and keeps the one with the lowest inertia,
/// so results are reproducible for a given seed and row order.
#[derive(Debug, Clone)]
pub struct KMeans {
    n_clusters: usize,
    n_init: usize,
    max_iter: usize,
    tolerance: f64,
    seed: u64,
}

impl KMeans {
    /// Creates a k-means instance.
    ///
    /// # Arguments
    ///
    /// * `n_clusters` - Exact number of clusters to produce.
    /// * `seed` - Seed for centroid initialization.
    pub fn new(n_clusters: usize, seed: u64) -> Self {
        Self {
            n_clusters,
            n_init: DEFAULT_N_INIT,
            max_iter: DEFAULT_MAX_ITER,
            tolerance: DEFAULT_TOLERANCE,
            seed,
        }
    }

    /// Sets the number of restarts.
    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init.max(1);
        self
    }

    /// Partitions the rows of `features` into `n_clusters` groups.
    ///
    /// # Errors
    ///
    /// Returns `ClusteringError` if the features are empty or non-finite,
    /// `n_clusters` is zero or exceeds the row count, or the iteration
    /// produces non-finite centroids.
    pub fn fit(&self, features: &Array2<f64>) -> Result<KMeansFit, ClusteringError> {
        ensure_finite(features)?;

        if self.n_clusters == 0 {
            return Err(ClusteringError::InvalidParameter(
                "n_clusters must be at least 1".to_string(),
            ));
        }
        if self.n_clusters > features.nrows() {
            return Err(ClusteringError::TooFewPoints {
                points: features.nrows(),
                clusters: self.n_clusters,
            });
        }

        let mean_variance = features
            .var_axis(Axis(0), 0.0)
            .mean()
            .unwrap_or(0.0);
        let tolerance = self.tolerance * mean_variance;

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut best: Option<KMeansFit> = None;

        for _ in 0..self.n_init {
            let centroids = self.init_centroids(features, &mut rng);
            let fit = self.lloyd(features, centroids, tolerance);

            if !fit.inertia.is_finite() {
                return Err(ClusteringError::Diverged(
                    "k-means produced a non-finite inertia".to_string(),
                ));
            }
            if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
                best = Some(fit);
            }
        }

        best.ok_or(ClusteringError::EmptyInput)
    }

    /// k-means++ seeding: each new centroid is drawn with probability
    /// proportional to its squared distance from the nearest chosen one.
    fn init_centroids(&self, features: &Array2<f64>, rng: &mut ChaCha8Rng) -> Array2<f64> {
        let n = features.nrows();
        let indices: Vec<usize> = (0..n).collect();

        let first = indices.choose(rng).copied().unwrap_or(0);
        let mut chosen: Vec<usize> = Vec::with_capacity(self.n_clusters);
        chosen.push(first);

        let mut min_sq: Vec<f64> = (0..n)
            .map(|i| squared_distance(features.row(i), features.row(first)))
            .collect();

        while chosen.len() < self.n_clusters {
            let total: f64 = min_sq.iter().sum();

            let next = if total > 0.0 && total.is_finite() {
                let roll: f64 = rng.random_range(0.0..total);
                let mut cumulative = 0.0;
                let mut pick = None;
                for (i, &weight) in min_sq.iter().enumerate() {
                    cumulative += weight;
                    if weight > 0.0 && roll < cumulative {
                        pick = Some(i);
                        break;
                    }
                }
                pick.or_else(|| min_sq.iter().rposition(|&w| w > 0.0))
                    .unwrap_or(first)
            } else {
                // Every remaining row coincides with a chosen centroid.
                let unused: Vec<usize> = indices
                    .iter()
                    .copied()
                    .filter(|i| !chosen.contains(i))
                    .collect();
                unused.choose(rng).copied().unwrap_or(first)
            };

            chosen.push(next);
            for (i, dist) in min_sq.iter_mut().enumerate() {
                *dist = dist.min(squared_distance(features.row(i), features.row(next)));
            }
        }

        features.select(Axis(0), &chosen)
    }

    fn lloyd(&self, features: &Array2<f64>, mut centroids: Array2<f64>, tolerance: f64) -> KMeansFit {
        let (n, dims) = features.dim();
        let k = centroids.nrows();
        let mut labels = vec![0usize; n];

        for _ in 0..self.max_iter {
            for (i, label) in labels.iter_mut().enumerate() {
                *label = nearest_centroid(features.row(i), &centroids).0;
            }

            let mut sums = Array2::<f64>::zeros((k, dims));
            let mut counts = vec![0usize; k];
            for (i, &label) in labels.iter().enumerate() {
                let mut row = sums.row_mut(label);
                row += &features.row(i);
                counts[label] += 1;
            }

            let mut shift = 0.0;
            for c in 0..k {
                // Empty clusters keep their previous centroid.
                if counts[c] == 0 {
                    continue;
                }
                let updated = sums.row(c).mapv(|v| v / counts[c] as f64);
                shift += squared_distance(updated.view(), centroids.row(c));
                centroids.row_mut(c).assign(&updated);
            }

            if shift <= tolerance {
                break;
            }
        }

        let mut inertia = 0.0;
        for (i, label) in labels.iter_mut().enumerate() {
            let (nearest, dist) = nearest_centroid(features.row(i), &centroids);
            *label = nearest;
            inertia += dist;
        }

        KMeansFit {
            labels,
            centroids,
            inertia,
        }
    }
}

/// Index of and squared distance to the nearest centroid; the first wins ties.
fn nearest_centroid(point: ArrayView1<f64>, centroids: &Array2<f64>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (c, centroid) in centroids.rows().into_iter().enumerate() {
        let dist = squared_distance(point, centroid);
        if dist < best.1 {
            best = (c, dist);
        }
    }
    best
}
