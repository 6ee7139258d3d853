//! Stage files under `<data_dir>/cache`.
//!
//! Each pipeline stage reads the previous stage's observation array and
//! writes its own, plus an optional stats document.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::DatasetError;
use crate::observation::Observation;

/// Raw observations produced by the fetch stage.
pub const RAW_OBSERVATIONS_FILE: &str = "observations.json";
/// Output of the deduplication stage.
pub const DEDUPLICATED_FILE: &str = "observations_deduplicated.json";
/// Deduplication stats document.
pub const DEDUPLICATION_STATS_FILE: &str = "deduplication_stats.json";
/// Output of the external quality stage.
pub const QUALITY_FILE: &str = "observations_quality.json";
/// Output of the selection stage.
pub const SELECTED_FILE: &str = "observations_selected.json";
/// Selection stats document.
pub const SELECTION_STATS_FILE: &str = "selection_stats.json";
/// Output of the balancing stage.
pub const BALANCED_FILE: &str = "observations_balanced.json";

/// Reads and writes stage files in a cache directory.
#[derive(Debug, Clone)]
pub struct StageStore {
    cache_dir: PathBuf,
}

impl StageStore {
    /// Creates a store rooted at `cache_dir`.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Returns the cache directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path of a stage file.
    pub fn path(&self, file_name: &str) -> PathBuf {
        self.cache_dir.join(file_name)
    }

    /// Input of the selection stage.
    ///
    /// Prefers quality-scored observations, then deduplicated ones, then the
    /// raw fetch output.
    ///
    /// # Errors
    ///
    /// Returns `DatasetError::NoInput` if none of them exist.
    pub async fn selection_input(&self) -> Result<PathBuf, DatasetError> {
        let quality = self.path(QUALITY_FILE);
        if tokio::fs::try_exists(&quality).await? {
            return Ok(quality);
        }
        warn!(
            "Quality file not found: {}. Falling back to deduplicated observations",
            quality.display()
        );

        for name in [DEDUPLICATED_FILE, RAW_OBSERVATIONS_FILE] {
            let path = self.path(name);
            if tokio::fs::try_exists(&path).await? {
                return Ok(path);
            }
        }

        Err(DatasetError::NoInput(self.cache_dir.clone()))
    }

    /// Loads an observation array.
    ///
    /// # Errors
    ///
    /// Returns `DatasetError::NotFound` if the file is missing and
    /// `DatasetError::Parse` if it is not a valid observation array.
    pub async fn load_observations(&self, path: &Path) -> Result<Vec<Observation>, DatasetError> {
        if !tokio::fs::try_exists(path).await? {
            return Err(DatasetError::NotFound(path.to_path_buf()));
        }

        let contents = tokio::fs::read_to_string(path).await?;
        let observations: Vec<Observation> =
            serde_json::from_str(&contents).map_err(|source| DatasetError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        debug!("Loaded {} observations from {}", observations.len(), path.display());
        Ok(observations)
    }

    /// Writes a value as pretty-printed JSON, creating the cache directory if needed.
    pub async fn write_json<T: Serialize + ?Sized>(
        &self,
        file_name: &str,
        value: &T,
    ) -> Result<PathBuf, DatasetError> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;

        let path = self.path(file_name);
        let contents = serde_json::to_string_pretty(value)?;
        tokio::fs::write(&path, contents).await?;

        debug!("Wrote {}", path.display());
        Ok(path)
    }
}
