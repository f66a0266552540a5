//! Employment counts per occupation and year
//!
//! Counts come from a provider (SCB PxWeb, or the snapshot of the last pull)
//! and are keyed by 4-digit occupation code and year. A missing count is
//! "no data", which is a different fact from a measured zero.

pub mod scb;
pub mod snapshot;

pub use scb::ScbClient;
pub use snapshot::SnapshotProvider;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use crate::config::EmploymentYearPolicy;
use crate::error::{DaioeError, Result};
use crate::taxonomy::{Level, OccupationCode, Taxonomy};

/// Which years to request from a provider
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum YearSelection {
    /// The most recent year the provider has
    #[default]
    Latest,
    /// Inclusive range; years the provider lacks are skipped
    Range(i32, i32),
    /// Every year the provider has
    All,
}

impl YearSelection {
    /// Pick the requested years out of the available ones
    #[must_use]
    pub fn select(&self, available: &[i32]) -> Vec<i32> {
        let mut years: Vec<i32> = match self {
            Self::Latest => available.iter().max().copied().into_iter().collect(),
            Self::Range(from, to) => available
                .iter()
                .copied()
                .filter(|y| (*from..=*to).contains(y))
                .collect(),
            Self::All => available.to_vec(),
        };
        years.sort_unstable();
        years.dedup();
        years
    }
}

/// Employment counts for one taxonomy
#[derive(Debug, Clone, PartialEq)]
pub struct EmploymentTable {
    taxonomy: Taxonomy,
    counts: BTreeMap<(OccupationCode, i32), Option<u64>>,
}

impl EmploymentTable {
    #[must_use]
    pub fn new(taxonomy: Taxonomy) -> Self {
        Self {
            taxonomy,
            counts: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn taxonomy(&self) -> Taxonomy {
        self.taxonomy
    }

    /// Record a count for a 4-digit occupation; a repeated key is an error.
    pub fn insert(&mut self, code: OccupationCode, year: i32, count: Option<u64>) -> Result<()> {
        if code.level() != Level::Four {
            return Err(DaioeError::aggregation_data(
                format!("{} employment ({code}, {year})", self.taxonomy),
                "employment counts must be keyed by 4-digit codes",
            ));
        }
        if self.counts.contains_key(&(code.clone(), year)) {
            return Err(DaioeError::aggregation_data(
                format!("{} employment ({code}, {year})", self.taxonomy),
                "duplicate employment record",
            ));
        }
        self.counts.insert((code, year), count);
        Ok(())
    }

    /// Count for an occupation and year; `None` when absent or unreported
    #[must_use]
    pub fn get(&self, code: &OccupationCode, year: i32) -> Option<u64> {
        self.counts.get(&(code.clone(), year)).copied().flatten()
    }

    /// Sorted distinct years
    #[must_use]
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.counts.keys().map(|(_, y)| *y).collect();
        years.sort_unstable();
        years.dedup();
        years
    }

    #[must_use]
    pub fn latest_year(&self) -> Option<i32> {
        self.counts.keys().map(|(_, y)| *y).max()
    }

    /// Number of (code, year) records, including unreported ones
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Records with a reported count
    #[must_use]
    pub fn reported(&self) -> usize {
        self.counts.values().filter(|c| c.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OccupationCode, i32, Option<u64>)> {
        self.counts.iter().map(|((code, year), count)| (code, *year, *count))
    }

    /// Keep only the given years
    pub fn retain_years(&mut self, years: &[i32]) {
        self.counts.retain(|(_, year), _| years.contains(year));
    }

    /// Employment year used to weight scores of `year`
    #[must_use]
    pub fn weight_year(&self, year: i32, policy: EmploymentYearPolicy) -> Option<i32> {
        match policy {
            EmploymentYearPolicy::Latest => self.latest_year(),
            EmploymentYearPolicy::Matching => Some(year),
            EmploymentYearPolicy::Fixed(fixed) => Some(fixed),
        }
    }
}

/// Boxed future returned by providers
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<EmploymentTable>> + Send + 'a>>;

/// Source of employment counts for a taxonomy
///
/// Implementations must be idempotent: the same request returns equivalent
/// data, modulo upstream revisions. Network and payload failures are
/// reported as [`DaioeError::DataSource`]; retry policy is the caller's.
pub trait EmploymentProvider: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Fetch counts for `taxonomy` and the selected years
    fn fetch<'a>(&'a self, taxonomy: Taxonomy, years: &'a YearSelection) -> FetchFuture<'a>;
}
