//! Configuration for the aggregation pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DaioeError, Result};
use crate::taxonomy::Level;

/// Default SCB PxWeb API root
pub const DEFAULT_SCB_BASE_URL: &str = "https://api.scb.se/OV0104/v1/doris";

/// Which employment year weights a given DAIOE year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentYearPolicy {
    /// Most recent year in the employment table, for every DAIOE year
    #[default]
    Latest,
    /// Employment of the same year; no weights when that year is absent
    Matching,
    /// A fixed employment year
    Fixed(i32),
}

/// Configuration for a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of the data directory tree
    pub data_dir: PathBuf,
    /// Field separator of the raw DAIOE files
    pub raw_separator: char,
    /// Inclusive year range to aggregate; all observed years when unset
    pub years: Option<(i32, i32)>,
    /// Emit null rows for configured years that have no raw scores at all
    pub emit_empty_years: bool,
    /// How employment weights are matched to DAIOE years
    pub employment_year: EmploymentYearPolicy,
    /// Provider codes dropped on ingest (SCB's unspecified bucket)
    pub excluded_codes: Vec<String>,
    /// Levels to aggregate
    pub levels: Vec<Level>,
    /// Worker threads for aggregation; `num_cpus` when unset
    pub threads: Option<usize>,
    /// SCB PxWeb API root
    pub scb_base_url: String,
    /// PxWeb language segment
    pub language: String,
    /// HTTP timeout for provider requests
    pub request_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            raw_separator: '\t',
            years: None,
            emit_empty_years: true,
            employment_year: EmploymentYearPolicy::default(),
            excluded_codes: vec!["0002".to_string()],
            levels: Level::ALL.to_vec(),
            threads: None,
            scb_base_url: DEFAULT_SCB_BASE_URL.to_string(),
            language: "en".to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl PipelineConfig {
    /// Load a JSON configuration file; missing keys take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DaioeError::io("Failed to read configuration", e).with_path(path))?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DAIOE_DATA_DIR` and `DAIOE_THREADS` if set
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var("DAIOE_DATA_DIR") {
            if !dir.trim().is_empty() {
                self.data_dir = PathBuf::from(dir);
            }
        }
        if let Some(threads) = std::env::var("DAIOE_THREADS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        {
            self.threads = Some(threads);
        }
        self
    }

    /// Reject settings that cannot produce a sensible run
    pub fn validate(&self) -> Result<()> {
        if let Some((from, to)) = self.years {
            if from > to {
                return Err(DaioeError::Config(format!(
                    "year range {from}..={to} is empty"
                )));
            }
        }
        if self.levels.is_empty() {
            return Err(DaioeError::Config("at least one level is required".to_string()));
        }
        if !self.raw_separator.is_ascii() {
            return Err(DaioeError::Config(format!(
                "raw separator {:?} must be a single ASCII character",
                self.raw_separator
            )));
        }
        if self.threads == Some(0) {
            return Err(DaioeError::Config("threads must be positive".to_string()));
        }
        Ok(())
    }

    /// Raw DAIOE score files
    #[must_use]
    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("01_daioe_raw")
    }

    /// Employment snapshots from SCB
    #[must_use]
    pub fn scb_dir(&self) -> PathBuf {
        self.data_dir.join("02_scb_data")
    }

    /// Aggregated artifacts
    #[must_use]
    pub fn aggregated_dir(&self) -> PathBuf {
        self.data_dir.join("03_daioe_aggregated")
    }

    /// Optional label translations
    #[must_use]
    pub fn translation_dir(&self) -> PathBuf {
        self.data_dir.join("04_translation_files")
    }

    /// Threads for the aggregation pool
    #[must_use]
    pub fn effective_threads(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get).max(1)
    }
}
