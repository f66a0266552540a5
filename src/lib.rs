//! Aggregation of DAIOE AI-exposure sub-indices over the SSYK occupation
//! hierarchy, weighted by SCB employment counts.
//!
//! The pipeline merges raw 4-digit scores with employment, rolls them up to
//! the 3-, 2- and 1-digit groups with an employment-weighted mean and a
//! simple average, ranks every (year, level, weighting, metric) slice and
//! writes one Parquet artifact per taxonomy.

pub mod aggregate;
pub mod artifact;
pub mod cli;
pub mod config;
pub mod daioe;
pub mod employment;
pub mod error;
pub mod pipeline;
pub mod query;
pub mod taxonomy;
pub mod utils;

// Re-export the most common types for easier use
pub use aggregate::{AggregatedRecord, AggregatedTable, AggregationOptions, Weighting, aggregate, rank_table};
pub use artifact::{export_csv, load_table, read_table, write_table};
pub use config::{EmploymentYearPolicy, PipelineConfig};
pub use daioe::{RawIndex, RawScoreTable, load_raw_index};
pub use employment::{EmploymentProvider, EmploymentTable, ScbClient, SnapshotProvider, YearSelection};
pub use error::{DaioeError, Result};
pub use pipeline::{Pipeline, RefreshStatus, RefreshSummary};
pub use query::{QueryOutcome, QueryParams, QueryResult, query_table, run_query};
pub use taxonomy::{Level, OccupationCode, Taxonomy, TaxonomyMap};
