//! Hierarchical aggregation of DAIOE scores
//!
//! The engine rolls 4-digit scores up to every requested level with two
//! weightings, and the ranker turns each (year, level, weighting, metric)
//! slice into percentile ranks.

pub mod engine;
pub mod rank;

pub use engine::{AggregationOptions, aggregate};
pub use rank::{percentile_ranks, rank_table};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DaioeError, Result};
use crate::taxonomy::{Level, OccupationCode, Taxonomy};

/// How scores of the members of a group are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Weighting {
    /// Mean weighted by employment counts
    #[serde(rename = "emp_weighted")]
    EmploymentWeighted,
    /// Unweighted mean of the non-missing scores
    #[serde(rename = "simple_avg")]
    SimpleAverage,
}

impl Weighting {
    pub const ALL: [Self; 2] = [Self::EmploymentWeighted, Self::SimpleAverage];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmploymentWeighted => "emp_weighted",
            Self::SimpleAverage => "simple_avg",
        }
    }
}

impl fmt::Display for Weighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Weighting {
    type Err = DaioeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "emp_weighted" | "weighted" | "employment" => Ok(Self::EmploymentWeighted),
            "simple_avg" | "simple" | "average" => Ok(Self::SimpleAverage),
            other => Err(DaioeError::Config(format!(
                "unknown weighting '{other}' (expected emp_weighted or simple_avg)"
            ))),
        }
    }
}

/// One aggregated value
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRecord {
    pub taxonomy: Taxonomy,
    pub level: Level,
    pub code: OccupationCode,
    pub label: String,
    pub year: i32,
    /// Metric name without the `daioe_` prefix
    pub metric: String,
    pub weighting: Weighting,
    pub value: Option<f64>,
    /// Percentile rank in (0, 100] within the record's slice
    pub pct_rank: Option<f64>,
    /// Distinct codes one level down with a raw row that year; 1 at level 4
    pub n_children: u32,
}

/// All aggregated records of one taxonomy
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedTable {
    taxonomy: Taxonomy,
    records: Vec<AggregatedRecord>,
}

impl AggregatedTable {
    /// Build a table; every record must belong to `taxonomy`.
    pub fn new(taxonomy: Taxonomy, records: Vec<AggregatedRecord>) -> Result<Self> {
        if let Some(stray) = records.iter().find(|r| r.taxonomy != taxonomy) {
            return Err(DaioeError::aggregation_data(
                format!("{} code {}", stray.taxonomy, stray.code),
                format!("record does not belong to {taxonomy}"),
            ));
        }
        Ok(Self { taxonomy, records })
    }

    #[must_use]
    pub const fn taxonomy(&self) -> Taxonomy {
        self.taxonomy
    }

    #[must_use]
    pub fn records(&self) -> &[AggregatedRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [AggregatedRecord] {
        &mut self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<AggregatedRecord> {
        self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct metric names in first-seen order
    #[must_use]
    pub fn metrics(&self) -> Vec<&str> {
        let mut metrics: Vec<&str> = Vec::new();
        for record in &self.records {
            if !metrics.contains(&record.metric.as_str()) {
                metrics.push(&record.metric);
            }
        }
        metrics
    }

    /// Sorted distinct years
    #[must_use]
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.records.iter().map(|r| r.year).collect();
        years.sort_unstable();
        years.dedup();
        years
    }

    /// Records with a value
    #[must_use]
    pub fn non_null(&self) -> usize {
        self.records.iter().filter(|r| r.value.is_some()).count()
    }
}
