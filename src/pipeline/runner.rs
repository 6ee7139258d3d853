//! Stage runner for the curation pipeline.
//!
//! Wires the deduplication, selection and balancing engines to the stage
//! files described by a `CurationConfig`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::diversity::{
    balance_dataset, DatasetStatistics, DeduplicationResult, SampleSelectionResult,
    SampleSelector,
};
use crate::error::DatasetError;

use super::config::CurationConfig;
use super::store::{
    StageStore, BALANCED_FILE, DEDUPLICATED_FILE, DEDUPLICATION_STATS_FILE,
    RAW_OBSERVATIONS_FILE, SELECTED_FILE, SELECTION_STATS_FILE,
};

/// Errors that can occur while running a stage.
#[derive(Debug, Error)]
pub enum RunError {
    /// Reading or writing a stage file failed.
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// The balance stage was run without a target.
    #[error("No balancing target: set balancing.target_per_species or pass --target")]
    MissingBalanceTarget,
}

/// Output of the deduplication stage.
#[derive(Debug, Clone)]
pub struct DedupOutcome {
    pub result: DeduplicationResult,
    pub output_path: PathBuf,
    pub stats_path: PathBuf,
}

/// Output of the selection stage.
#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    pub result: SampleSelectionResult,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub stats_path: PathBuf,
}

/// Output of the balancing stage.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceOutcome {
    pub input_count: usize,
    pub output_count: usize,
    pub output_path: PathBuf,
}

/// Runs pipeline stages against the stage files of one data directory.
#[derive(Debug, Clone)]
pub struct CurationRunner {
    config: CurationConfig,
    store: StageStore,
}

impl CurationRunner {
    /// Creates a runner for the given configuration.
    pub fn new(config: CurationConfig) -> Self {
        let store = StageStore::new(config.cache_dir());
        Self { config, store }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CurationConfig {
        &self.config
    }

    /// Returns the stage store.
    pub fn store(&self) -> &StageStore {
        &self.store
    }

    /// Deduplicates the raw observations.
    ///
    /// Reads `observations.json`, writes `observations_deduplicated.json`
    /// and `deduplication_stats.json`.
    ///
    /// # Errors
    ///
    /// Returns `RunError::Dataset` if the input is missing or malformed or an
    /// output cannot be written.
    pub async fn run_dedup(&self) -> Result<DedupOutcome, RunError> {
        let input_path = self.store.path(RAW_OBSERVATIONS_FILE);
        let observations = self.store.load_observations(&input_path).await?;
        info!(
            "Loaded {} observations from {}",
            observations.len(),
            input_path.display()
        );

        let dedup_config = &self.config.deduplication;
        info!(
            "Deduplication parameters: spatial={}m, temporal={} days",
            dedup_config.spatial_threshold_m, dedup_config.temporal_threshold_days
        );

        let deduplicator = dedup_config.deduplicator();
        let result = deduplicator.deduplicate(&observations);

        let output_path = self
            .store
            .write_json(DEDUPLICATED_FILE, &result.deduplicated_observations())
            .await?;
        info!(
            "Saved {} deduplicated observations to {}",
            result.total_unique,
            output_path.display()
        );

        let stats_path = self
            .store
            .write_json(
                DEDUPLICATION_STATS_FILE,
                &result.stats(deduplicator.parameters()),
            )
            .await?;

        Ok(DedupOutcome {
            result,
            output_path,
            stats_path,
        })
    }

    /// Selects representative samples from the best available candidate file.
    ///
    /// Writes `observations_selected.json` and `selection_stats.json`.
    pub async fn run_select(&self) -> Result<SelectionOutcome, RunError> {
        let input_path = self.store.selection_input().await?;
        let observations = self.store.load_observations(&input_path).await?;
        info!(
            "Loaded {} observations from {}",
            observations.len(),
            input_path.display()
        );

        let sampling = &self.config.sampling;
        info!(
            "Selection parameters: method={}, n={}, min={}",
            sampling.method, sampling.samples_per_species, sampling.min_samples_per_species
        );

        let mut selector = SampleSelector::new(sampling.method, sampling.seed);
        let result = selector.select_samples(
            &observations,
            sampling.samples_per_species,
            sampling.min_samples_per_species,
            sampling.diversity_weight,
            sampling.quality_weight,
        );

        let output_path = self.store.write_json(SELECTED_FILE, &result.selected).await?;
        info!(
            "Saved {} selected observations to {}",
            result.total_selected,
            output_path.display()
        );

        let stats_path = self
            .store
            .write_json(SELECTION_STATS_FILE, &result.stats(sampling.parameters()))
            .await?;

        Ok(SelectionOutcome {
            result,
            input_path,
            output_path,
            stats_path,
        })
    }

    /// Balances the selected observations to a uniform per-species target.
    ///
    /// Reads `observations_selected.json`, writes `observations_balanced.json`.
    ///
    /// # Errors
    ///
    /// Returns `RunError::MissingBalanceTarget` if no target is configured.
    pub async fn run_balance(&self) -> Result<BalanceOutcome, RunError> {
        let target = self
            .config
            .balancing
            .target_per_species
            .ok_or(RunError::MissingBalanceTarget)?;

        let input_path = self.store.path(SELECTED_FILE);
        let observations = self.store.load_observations(&input_path).await?;

        let balanced = balance_dataset(
            &observations,
            target,
            self.config.balancing.allow_undersampling,
        );

        let output_path = self.store.write_json(BALANCED_FILE, &balanced).await?;

        Ok(BalanceOutcome {
            input_count: observations.len(),
            output_count: balanced.len(),
            output_path,
        })
    }

    /// Computes statistics for an observation file.
    ///
    /// Defaults to the selected observations when `input` is `None`.
    pub async fn run_stats(&self, input: Option<&Path>) -> Result<DatasetStatistics, RunError> {
        let input_path = match input {
            Some(path) => path.to_path_buf(),
            None => self.store.path(SELECTED_FILE),
        };
        let observations = self.store.load_observations(&input_path).await?;
        Ok(DatasetStatistics::calculate(&observations))
    }
}
