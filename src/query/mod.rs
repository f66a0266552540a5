//! Filtering and ordering of an aggregated table for display
//!
//! A query narrows the table to one (level, metric, weighting) slice, drops
//! missing values, applies the year range and label search, and keeps the
//! top-N occupations ranked by their value in the latest remaining year.

pub mod filter;

pub use filter::{AndFilter, LabelSearchFilter, NonNullFilter, RecordFilter, SliceFilter, YearRangeFilter};

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use crate::aggregate::{AggregatedRecord, AggregatedTable, Weighting};
use crate::artifact::load_table;
use crate::error::Result;
use crate::taxonomy::{Level, OccupationCode, Taxonomy};

/// Years shown when no range is given
pub const DEFAULT_YEAR_SPAN: i32 = 9;

/// Query parameters
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams {
    pub taxonomy: Taxonomy,
    pub level: Level,
    /// Metric name without the `daioe_` prefix
    pub metric: String,
    pub weighting: Weighting,
    /// Inclusive range; the last [`DEFAULT_YEAR_SPAN`] years when unset
    pub years: Option<(i32, i32)>,
    /// Number of occupations to keep, 0 for all
    pub top_n: usize,
    /// Rank the highest values first
    pub descending: bool,
    /// Case-insensitive substring of the label
    pub search: Option<String>,
}

impl QueryParams {
    #[must_use]
    pub fn new(taxonomy: Taxonomy, level: Level, metric: impl Into<String>, weighting: Weighting) -> Self {
        Self {
            taxonomy,
            level,
            metric: metric.into(),
            weighting,
            years: None,
            top_n: 10,
            descending: false,
            search: None,
        }
    }

    /// Year range to apply to `table`
    #[must_use]
    pub fn year_range(&self, table: &AggregatedTable) -> Option<(i32, i32)> {
        self.years.or_else(|| {
            let latest = table.years().last().copied()?;
            Some((latest - (DEFAULT_YEAR_SPAN - 1), latest))
        })
    }

    fn filter(&self, table: &AggregatedTable) -> AndFilter {
        let mut filters: Vec<Arc<dyn RecordFilter + Send + Sync>> = vec![
            Arc::new(SliceFilter::new(self.level, &self.metric, self.weighting)),
            Arc::new(NonNullFilter),
        ];
        if let Some((from, to)) = self.year_range(table) {
            filters.push(Arc::new(YearRangeFilter::new(from, to)));
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            filters.push(Arc::new(LabelSearchFilter::new(search)));
        }
        AndFilter::new(filters)
    }
}

/// One occupation across years
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub code: OccupationCode,
    pub label: String,
    /// `(year, value, pct_rank)` in year order
    pub points: Vec<(i32, f64, Option<f64>)>,
}

impl Series {
    /// Value in `year`, if present
    #[must_use]
    pub fn value_in(&self, year: i32) -> Option<f64> {
        self.points.iter().find(|(y, _, _)| *y == year).map(|(_, v, _)| *v)
    }
}

/// Occupations selected by a query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub params: QueryParams,
    /// Latest year among the matching rows
    pub latest_year: i32,
    /// Ordered by the latest year's value in the requested direction
    pub series: Vec<Series>,
}

impl QueryResult {
    /// Sorted distinct years present in the result
    #[must_use]
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self
            .series
            .iter()
            .flat_map(|s| s.points.iter().map(|(y, _, _)| *y))
            .collect();
        years.sort_unstable();
        years.dedup();
        years
    }
}

/// Result of a query, including the states with nothing to show
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// No artifact has been written for the taxonomy yet
    NoArtifact,
    /// The artifact exists but no row survives the filters
    NoMatchingRows,
    Series(QueryResult),
}

fn compare_values(a: f64, b: f64, descending: bool) -> Ordering {
    if descending { b.total_cmp(&a) } else { a.total_cmp(&b) }
}

/// Run `params` against an in-memory table
#[must_use]
pub fn query_table(table: &AggregatedTable, params: &QueryParams) -> QueryOutcome {
    let filter = params.filter(table);
    log::debug!("[{}] query: {}", table.taxonomy(), filter.describe());
    let rows: Vec<&AggregatedRecord> = table.records().iter().filter(|r| filter.keep(r)).collect();
    let Some(latest_year) = rows.iter().map(|r| r.year).max() else {
        return QueryOutcome::NoMatchingRows;
    };

    // Only occupations present in the latest year are shown, in its order
    let mut latest: Vec<&AggregatedRecord> = rows.iter().copied().filter(|r| r.year == latest_year).collect();
    latest.sort_by(|a, b| {
        compare_values(a.value.unwrap_or_default(), b.value.unwrap_or_default(), params.descending)
            .then_with(|| a.code.cmp(&b.code))
    });
    let mut order: Vec<&OccupationCode> = latest.iter().map(|r| &r.code).collect();
    if params.top_n > 0 {
        order.truncate(params.top_n);
    }

    let series = order
        .into_iter()
        .map(|code| {
            let mut points: Vec<(i32, f64, Option<f64>)> = rows
                .iter()
                .filter(|r| &r.code == code)
                .filter_map(|r| r.value.map(|v| (r.year, v, r.pct_rank)))
                .collect();
            points.sort_by_key(|(year, _, _)| *year);
            let label = rows
                .iter()
                .rev()
                .find(|r| &r.code == code)
                .map(|r| r.label.clone())
                .unwrap_or_default();
            Series {
                code: code.clone(),
                label,
                points,
            }
        })
        .collect();

    QueryOutcome::Series(QueryResult {
        params: params.clone(),
        latest_year,
        series,
    })
}

/// Load the artifact of `params.taxonomy` from `dir` and query it
pub fn run_query(dir: &Path, params: &QueryParams) -> Result<QueryOutcome> {
    match load_table(dir, params.taxonomy)? {
        Some(table) => Ok(query_table(&table, params)),
        None => Ok(QueryOutcome::NoArtifact),
    }
}
