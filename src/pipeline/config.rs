//! Configuration for the curation pipeline.
//!
//! Settings are read from a YAML file, then overridden by `FAUNA_*`
//! environment variables, then validated. Command-line flags are applied
//! last by the CLI.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diversity::{
    DeduplicationParameters, ObservationDeduplicator, SelectionMethod, SelectionParameters,
};

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// The configuration file is not valid YAML for this schema.
    #[error("Failed to parse configuration '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter level when `RUST_LOG` and `--log-level` are unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Deduplication thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeduplicationConfig {
    /// Observations closer than this many meters may be the same individual.
    pub spatial_threshold_m: f64,
    /// Observations closer than this many days may be the same individual.
    pub temporal_threshold_days: f64,
    /// Minimum neighbourhood size for a cluster.
    pub min_cluster_samples: usize,
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            spatial_threshold_m: 100.0,
            temporal_threshold_days: 1.0,
            min_cluster_samples: 1,
        }
    }
}

impl DeduplicationConfig {
    /// Builds the deduplicator described by these settings.
    pub fn deduplicator(&self) -> ObservationDeduplicator {
        ObservationDeduplicator::new(self.spatial_threshold_m, self.temporal_threshold_days)
            .with_min_cluster_samples(self.min_cluster_samples)
    }

    /// Returns the thresholds as recorded in the stats document.
    pub fn parameters(&self) -> DeduplicationParameters {
        self.deduplicator().parameters()
    }
}

/// Sample selection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub method: SelectionMethod,
    pub samples_per_species: usize,
    pub min_samples_per_species: usize,
    pub diversity_weight: f64,
    pub quality_weight: f64,
    pub seed: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            method: SelectionMethod::Clustering,
            samples_per_species: 50,
            min_samples_per_species: 10,
            diversity_weight: 0.7,
            quality_weight: 0.3,
            seed: 42,
        }
    }
}

impl SamplingConfig {
    /// Returns the selection settings as recorded in the stats document.
    pub fn parameters(&self) -> SelectionParameters {
        SelectionParameters {
            samples_per_species: self.samples_per_species,
            min_samples_per_species: self.min_samples_per_species,
            diversity_weight: self.diversity_weight,
            quality_weight: self.quality_weight,
            seed: self.seed,
        }
    }
}

/// Dataset balancing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancingConfig {
    /// Uniform per-species target; the `balance` stage requires one.
    pub target_per_species: Option<usize>,
    /// Whether species above the target are reduced to it.
    pub allow_undersampling: bool,
}

impl Default for BalancingConfig {
    fn default() -> Self {
        Self {
            target_per_species: None,
            allow_undersampling: true,
        }
    }
}

/// Configuration for the curation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurationConfig {
    /// Root data directory; stage files live under `<data_dir>/cache`.
    pub data_dir: PathBuf,
    pub logging: LoggingConfig,
    pub deduplication: DeduplicationConfig,
    pub sampling: SamplingConfig,
    pub balancing: BalancingConfig,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            logging: LoggingConfig::default(),
            deduplication: DeduplicationConfig::default(),
            sampling: SamplingConfig::default(),
            balancing: BalancingConfig::default(),
        }
    }
}

impl CurationConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file, applies environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or parsed, an
    /// override is malformed, or validation fails.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Creates configuration from defaults and environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `FAUNA_DATA_DIR`: Data directory (default: ./data)
    /// - `FAUNA_LOG_LEVEL`: Log level (default: info)
    /// - `FAUNA_SPATIAL_THRESHOLD_M`: Deduplication distance (default: 100)
    /// - `FAUNA_TEMPORAL_THRESHOLD_DAYS`: Deduplication time window (default: 1)
    /// - `FAUNA_MIN_CLUSTER_SAMPLES`: Minimum cluster size (default: 1)
    /// - `FAUNA_SELECTION_METHOD`: clustering, stratified, quality or random
    /// - `FAUNA_SAMPLES_PER_SPECIES`: Selection cap per species (default: 50)
    /// - `FAUNA_MIN_SAMPLES_PER_SPECIES`: Minimum candidates per species (default: 10)
    /// - `FAUNA_DIVERSITY_WEIGHT`: Diversity weight (default: 0.7)
    /// - `FAUNA_QUALITY_WEIGHT`: Quality weight (default: 0.3)
    /// - `FAUNA_SEED`: Selection seed (default: 42)
    /// - `FAUNA_TARGET_PER_SPECIES`: Balancing target
    /// - `FAUNA_ALLOW_UNDERSAMPLING`: Reduce species above the target (default: true)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `FAUNA_*` environment variables on top of the current values.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up by variable name.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("FAUNA_DATA_DIR") {
            self.data_dir = PathBuf::from(val);
        }

        if let Some(val) = lookup("FAUNA_LOG_LEVEL") {
            self.logging.level = val;
        }

        // Deduplication settings
        if let Some(val) = lookup("FAUNA_SPATIAL_THRESHOLD_M") {
            self.deduplication.spatial_threshold_m =
                parse_env_value(&val, "FAUNA_SPATIAL_THRESHOLD_M")?;
        }

        if let Some(val) = lookup("FAUNA_TEMPORAL_THRESHOLD_DAYS") {
            self.deduplication.temporal_threshold_days =
                parse_env_value(&val, "FAUNA_TEMPORAL_THRESHOLD_DAYS")?;
        }

        if let Some(val) = lookup("FAUNA_MIN_CLUSTER_SAMPLES") {
            self.deduplication.min_cluster_samples =
                parse_env_value(&val, "FAUNA_MIN_CLUSTER_SAMPLES")?;
        }

        // Sampling settings
        if let Some(val) = lookup("FAUNA_SELECTION_METHOD") {
            self.sampling.method = val.parse().map_err(|message| ConfigError::InvalidValue {
                key: "FAUNA_SELECTION_METHOD".to_string(),
                message,
            })?;
        }

        if let Some(val) = lookup("FAUNA_SAMPLES_PER_SPECIES") {
            self.sampling.samples_per_species = parse_env_value(&val, "FAUNA_SAMPLES_PER_SPECIES")?;
        }

        if let Some(val) = lookup("FAUNA_MIN_SAMPLES_PER_SPECIES") {
            self.sampling.min_samples_per_species =
                parse_env_value(&val, "FAUNA_MIN_SAMPLES_PER_SPECIES")?;
        }

        if let Some(val) = lookup("FAUNA_DIVERSITY_WEIGHT") {
            self.sampling.diversity_weight = parse_env_value(&val, "FAUNA_DIVERSITY_WEIGHT")?;
        }

        if let Some(val) = lookup("FAUNA_QUALITY_WEIGHT") {
            self.sampling.quality_weight = parse_env_value(&val, "FAUNA_QUALITY_WEIGHT")?;
        }

        if let Some(val) = lookup("FAUNA_SEED") {
            self.sampling.seed = parse_env_value(&val, "FAUNA_SEED")?;
        }

        // Balancing settings
        if let Some(val) = lookup("FAUNA_TARGET_PER_SPECIES") {
            self.balancing.target_per_species =
                Some(parse_env_value(&val, "FAUNA_TARGET_PER_SPECIES")?);
        }

        if let Some(val) = lookup("FAUNA_ALLOW_UNDERSAMPLING") {
            self.balancing.allow_undersampling =
                parse_env_bool(&val, "FAUNA_ALLOW_UNDERSAMPLING")?;
        }

        Ok(())
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "logging.level cannot be empty".to_string(),
            ));
        }

        // Deduplication validation
        let dedup = &self.deduplication;
        if !(dedup.spatial_threshold_m.is_finite() && dedup.spatial_threshold_m > 0.0) {
            return Err(ConfigError::ValidationFailed(
                "spatial_threshold_m must be greater than 0".to_string(),
            ));
        }

        if !(dedup.temporal_threshold_days.is_finite() && dedup.temporal_threshold_days > 0.0) {
            return Err(ConfigError::ValidationFailed(
                "temporal_threshold_days must be greater than 0".to_string(),
            ));
        }

        if dedup.min_cluster_samples == 0 {
            return Err(ConfigError::ValidationFailed(
                "min_cluster_samples must be greater than 0".to_string(),
            ));
        }

        // Sampling validation
        let sampling = &self.sampling;
        if sampling.samples_per_species == 0 {
            return Err(ConfigError::ValidationFailed(
                "samples_per_species must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&sampling.diversity_weight) {
            return Err(ConfigError::ValidationFailed(
                "diversity_weight must be between 0.0 and 1.0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&sampling.quality_weight) {
            return Err(ConfigError::ValidationFailed(
                "quality_weight must be between 0.0 and 1.0".to_string(),
            ));
        }

        // Balancing validation
        if self.balancing.target_per_species == Some(0) {
            return Err(ConfigError::ValidationFailed(
                "target_per_species must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Directory holding the stage files.
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    /// Builder method to set the data directory.
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Builder method to set the deduplication thresholds.
    pub fn with_thresholds(mut self, spatial_threshold_m: f64, temporal_threshold_days: f64) -> Self {
        self.deduplication.spatial_threshold_m = spatial_threshold_m;
        self.deduplication.temporal_threshold_days = temporal_threshold_days;
        self
    }

    /// Builder method to set the selection method.
    pub fn with_selection_method(mut self, method: SelectionMethod) -> Self {
        self.sampling.method = method;
        self
    }

    /// Builder method to set the selection cap per species.
    pub fn with_samples_per_species(mut self, samples: usize) -> Self {
        self.sampling.samples_per_species = samples;
        self
    }

    /// Builder method to set the minimum candidates per species.
    pub fn with_min_samples_per_species(mut self, samples: usize) -> Self {
        self.sampling.min_samples_per_species = samples;
        self
    }

    /// Builder method to set the selection seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.sampling.seed = seed;
        self
    }

    /// Builder method to set the balancing target.
    pub fn with_target_per_species(mut self, target: usize) -> Self {
        self.balancing.target_per_species = Some(target);
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}
