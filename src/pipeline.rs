//! Refresh orchestration
//!
//! A refresh fetches employment for every selected taxonomy concurrently,
//! then for each taxonomy loads the raw scores, aggregates, ranks and
//! replaces the artifact. Taxonomies are independent: a failure in one never
//! touches another's artifact, and a provider failure leaves the previous
//! artifact of that taxonomy in place.

use std::path::PathBuf;
use std::time::Instant;

use futures::future::join_all;
use log::{error, info, warn};

use crate::aggregate::{AggregatedTable, AggregationOptions, aggregate, rank_table};
use crate::artifact::{artifact_path, write_table};
use crate::config::{EmploymentYearPolicy, PipelineConfig};
use crate::daioe::{load_label_translations, load_raw_index};
use crate::employment::snapshot::write_snapshot;
use crate::employment::{EmploymentProvider, EmploymentTable, YearSelection};
use crate::error::{DaioeError, Result};
use crate::taxonomy::Taxonomy;
use crate::utils::logging::{create_main_progress_bar, finish_progress_bar, log_stage, log_warning};

/// What happened to one taxonomy during a refresh
#[derive(Debug)]
pub enum RefreshStatus {
    /// A new artifact was written
    Written {
        path: PathBuf,
        records: usize,
        non_null: usize,
    },
    /// The provider failed; the previous artifact (if any) was kept
    KeptPrevious {
        error: DaioeError,
        artifact: Option<PathBuf>,
    },
    /// The taxonomy could not be processed
    Failed(DaioeError),
}

/// Outcome of a refresh for one taxonomy
#[derive(Debug)]
pub struct RefreshSummary {
    pub taxonomy: Taxonomy,
    pub status: RefreshStatus,
    /// Snapshot written for the pulled employment, if any
    pub snapshot: Option<PathBuf>,
}

impl RefreshSummary {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, RefreshStatus::Written { .. })
    }
}

/// Outcome of a pull for one taxonomy
#[derive(Debug)]
pub struct PullSummary {
    pub taxonomy: Taxonomy,
    pub result: Result<PathBuf>,
}

/// Years to request from the provider under the configured employment-year policy
#[must_use]
pub fn year_selection(config: &PipelineConfig) -> YearSelection {
    match config.employment_year {
        EmploymentYearPolicy::Latest => YearSelection::Latest,
        EmploymentYearPolicy::Matching => match config.years {
            Some((from, to)) => YearSelection::Range(from, to),
            None => YearSelection::All,
        },
        EmploymentYearPolicy::Fixed(year) => YearSelection::Range(year, year),
    }
}

/// Refresh pipeline bound to one configuration
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fetch employment for `taxonomies` concurrently, in input order
    async fn fetch_all(
        &self,
        provider: &dyn EmploymentProvider,
        taxonomies: &[Taxonomy],
        years: &YearSelection,
    ) -> Vec<Result<EmploymentTable>> {
        info!(
            "Fetching employment for {} taxonomies from {}",
            taxonomies.len(),
            provider.name()
        );
        join_all(taxonomies.iter().map(|&taxonomy| provider.fetch(taxonomy, years))).await
    }

    /// Fetch employment and write snapshots, without aggregating
    pub async fn pull(&self, provider: &dyn EmploymentProvider, taxonomies: &[Taxonomy]) -> Vec<PullSummary> {
        let years = year_selection(&self.config);
        let fetched = self.fetch_all(provider, taxonomies, &years).await;

        taxonomies
            .iter()
            .zip(fetched)
            .map(|(&taxonomy, result)| PullSummary {
                taxonomy,
                result: result.and_then(|table| {
                    write_snapshot(&self.config.scb_dir(), &table, &self.config.language)
                }),
            })
            .collect()
    }

    /// Refresh the artifacts of `taxonomies`
    ///
    /// # Arguments
    /// * `provider` - Source of employment counts
    /// * `taxonomies` - Taxonomies to refresh
    /// * `persist_snapshots` - Write a snapshot of each successful pull
    pub async fn refresh(
        &self,
        provider: &dyn EmploymentProvider,
        taxonomies: &[Taxonomy],
        persist_snapshots: bool,
    ) -> Vec<RefreshSummary> {
        let start = Instant::now();
        let years = year_selection(&self.config);
        let fetched = self.fetch_all(provider, taxonomies, &years).await;

        let pb = create_main_progress_bar(taxonomies.len() as u64, Some("Refreshing taxonomies"));
        let mut summaries = Vec::with_capacity(taxonomies.len());
        for (&taxonomy, employment) in taxonomies.iter().zip(fetched) {
            pb.set_message(format!("Refreshing {taxonomy}"));
            summaries.push(self.refresh_one(taxonomy, employment, persist_snapshots));
            pb.inc(1);
        }
        finish_progress_bar(&pb, Some("Refresh complete"));

        let written = summaries.iter().filter(|s| s.is_success()).count();
        info!(
            "Refreshed {written} of {} taxonomies in {:?}",
            summaries.len(),
            start.elapsed()
        );
        summaries
    }

    fn refresh_one(
        &self,
        taxonomy: Taxonomy,
        employment: Result<EmploymentTable>,
        persist_snapshot: bool,
    ) -> RefreshSummary {
        let employment = match employment {
            Ok(table) => table,
            Err(error) if error.is_recoverable() => {
                let path = artifact_path(&self.config.aggregated_dir(), taxonomy);
                let artifact = path.is_file().then_some(path);
                warn!(
                    "[{taxonomy}] employment unavailable ({error}); keeping {}",
                    artifact
                        .as_ref()
                        .map_or_else(|| "no previous artifact".to_string(), |p| p.display().to_string())
                );
                return RefreshSummary {
                    taxonomy,
                    status: RefreshStatus::KeptPrevious { error, artifact },
                    snapshot: None,
                };
            }
            Err(error) => {
                error!("[{taxonomy}] refresh failed: {error}");
                return RefreshSummary {
                    taxonomy,
                    status: RefreshStatus::Failed(error),
                    snapshot: None,
                };
            }
        };

        let snapshot = if persist_snapshot {
            match write_snapshot(&self.config.scb_dir(), &employment, &self.config.language) {
                Ok(path) => Some(path),
                Err(e) => {
                    log_warning(&format!("[{taxonomy}] could not write employment snapshot: {e}"), None);
                    None
                }
            }
        } else {
            None
        };

        let status = match self.build_table(taxonomy, &employment) {
            Ok(table) => match write_table(&self.config.aggregated_dir(), &table) {
                Ok(path) => RefreshStatus::Written {
                    path,
                    records: table.len(),
                    non_null: table.non_null(),
                },
                Err(e) => RefreshStatus::Failed(e),
            },
            Err(e) => RefreshStatus::Failed(e),
        };
        if let RefreshStatus::Failed(e) = &status {
            error!("[{taxonomy}] refresh failed: {e}");
        }

        RefreshSummary {
            taxonomy,
            status,
            snapshot,
        }
    }

    /// Load raw scores, aggregate and rank one taxonomy
    pub fn build_table(&self, taxonomy: Taxonomy, employment: &EmploymentTable) -> Result<AggregatedTable> {
        log_stage(taxonomy, "loading raw scores");
        let raw_path = self.config.raw_dir().join(taxonomy.raw_file_name());
        let mut raw = load_raw_index(&raw_path, taxonomy, self.config.raw_separator)?;

        let translations = self.config.translation_dir().join(format!("{taxonomy}_labels.csv"));
        if translations.is_file() {
            let replaced = raw.map.apply_labels(load_label_translations(&translations)?);
            info!("[{taxonomy}] applied {replaced} label translations");
        }

        log_stage(taxonomy, "aggregating");
        let options = AggregationOptions::from(&self.config);
        let mut table = aggregate(&raw.map, &raw.scores, employment, &options)?;

        log_stage(taxonomy, "ranking");
        rank_table(&mut table);
        Ok(table)
    }
}
