//! Row filters over aggregated records
//!
//! Filters are small predicates that can be combined; a query is the
//! conjunction of the filters its parameters ask for.

use std::sync::Arc;

use crate::aggregate::{AggregatedRecord, Weighting};
use crate::taxonomy::Level;

/// Trait for predicates over aggregated records
pub trait RecordFilter: std::fmt::Debug {
    /// Whether `record` passes the filter
    fn keep(&self, record: &AggregatedRecord) -> bool;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Rows of one (level, metric, weighting) slice
#[derive(Debug, Clone)]
pub struct SliceFilter {
    level: Level,
    metric: String,
    weighting: Weighting,
}

impl SliceFilter {
    #[must_use]
    pub fn new(level: Level, metric: &str, weighting: Weighting) -> Self {
        Self {
            level,
            metric: metric.trim_start_matches(crate::daioe::METRIC_PREFIX).to_string(),
            weighting,
        }
    }
}

impl RecordFilter for SliceFilter {
    fn keep(&self, record: &AggregatedRecord) -> bool {
        record.level == self.level && record.weighting == self.weighting && record.metric == self.metric
    }

    fn describe(&self) -> String {
        format!("level {} {} {}", self.level, self.metric, self.weighting)
    }
}

/// Rows with a value
#[derive(Debug, Clone, Copy, Default)]
pub struct NonNullFilter;

impl RecordFilter for NonNullFilter {
    fn keep(&self, record: &AggregatedRecord) -> bool {
        record.value.is_some()
    }

    fn describe(&self) -> String {
        "value present".to_string()
    }
}

/// Rows within an inclusive year range
#[derive(Debug, Clone, Copy)]
pub struct YearRangeFilter {
    from: i32,
    to: i32,
}

impl YearRangeFilter {
    /// A reversed range is normalized
    #[must_use]
    pub fn new(from: i32, to: i32) -> Self {
        Self {
            from: from.min(to),
            to: from.max(to),
        }
    }
}

impl RecordFilter for YearRangeFilter {
    fn keep(&self, record: &AggregatedRecord) -> bool {
        (self.from..=self.to).contains(&record.year)
    }

    fn describe(&self) -> String {
        format!("years {}..={}", self.from, self.to)
    }
}

/// Rows whose label or code contains a search string, ignoring case
#[derive(Debug, Clone)]
pub struct LabelSearchFilter {
    needle: String,
}

impl LabelSearchFilter {
    #[must_use]
    pub fn new(search: &str) -> Self {
        Self {
            needle: search.trim().to_lowercase(),
        }
    }
}

impl RecordFilter for LabelSearchFilter {
    fn keep(&self, record: &AggregatedRecord) -> bool {
        record.label.to_lowercase().contains(&self.needle) || record.code.as_str().starts_with(&self.needle)
    }

    fn describe(&self) -> String {
        format!("label contains '{}'", self.needle)
    }
}

/// A filter that combines multiple filters with a logical AND
#[derive(Debug, Clone)]
pub struct AndFilter {
    filters: Vec<Arc<dyn RecordFilter + Send + Sync>>,
}

impl AndFilter {
    #[must_use]
    pub fn new(filters: Vec<Arc<dyn RecordFilter + Send + Sync>>) -> Self {
        Self { filters }
    }
}

impl RecordFilter for AndFilter {
    fn keep(&self, record: &AggregatedRecord) -> bool {
        self.filters.iter().all(|f| f.keep(record))
    }

    fn describe(&self) -> String {
        if self.filters.is_empty() {
            return "all rows".to_string();
        }
        self.filters
            .iter()
            .map(|f| f.describe())
            .collect::<Vec<_>>()
            .join(" and ")
    }
}
