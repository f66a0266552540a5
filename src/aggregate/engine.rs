//! Roll-up of 4-digit scores to coarser groups
//!
//! For a group `g`, year and metric:
//!
//! * employment-weighted mean: `Σ E_k·D_k / Σ E_k` over members with both a
//!   score and an employment count
//! * simple average: mean of the members' non-missing scores
//!
//! Level 4 is the identity for both. Every (level, group, year, metric,
//! weighting) cell is emitted, with `None` where nothing could be computed.

use std::time::Instant;

use log::{debug, info};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::aggregate::{AggregatedRecord, AggregatedTable, Weighting};
use crate::config::{EmploymentYearPolicy, PipelineConfig};
use crate::daioe::RawScoreTable;
use crate::employment::EmploymentTable;
use crate::error::{DaioeError, Result};
use crate::taxonomy::{Level, OccupationCode, TaxonomyMap};

/// Settings that shape the output grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationOptions {
    pub levels: Vec<Level>,
    /// Inclusive year range; all observed years when unset
    pub years: Option<(i32, i32)>,
    /// Emit null rows for years in `years` that have no raw scores
    pub emit_empty_years: bool,
    pub employment_year: EmploymentYearPolicy,
}

impl Default for AggregationOptions {
    fn default() -> Self {
        Self {
            levels: Level::ALL.to_vec(),
            years: None,
            emit_empty_years: true,
            employment_year: EmploymentYearPolicy::Latest,
        }
    }
}

impl From<&PipelineConfig> for AggregationOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            levels: config.levels.clone(),
            years: config.years,
            emit_empty_years: config.emit_empty_years,
            employment_year: config.employment_year,
        }
    }
}

impl AggregationOptions {
    /// Years to emit given the years that have raw scores
    #[must_use]
    pub fn years_to_emit(&self, observed: &[i32]) -> Vec<i32> {
        match self.years {
            Some((from, to)) if self.emit_empty_years => (from..=to).collect(),
            Some((from, to)) => observed
                .iter()
                .copied()
                .filter(|y| (from..=to).contains(y))
                .collect(),
            None => observed.to_vec(),
        }
    }

    fn sorted_levels(&self) -> Vec<Level> {
        let mut levels = self.levels.clone();
        levels.sort_unstable();
        levels.dedup();
        levels
    }
}

/// Employment-weighted mean of `(score, employment)` pairs.
///
/// Pairs missing either side are skipped; no usable pair or zero total
/// employment gives `None`.
#[must_use]
pub fn weighted_mean<I>(pairs: I) -> Option<f64>
where
    I: IntoIterator<Item = (Option<f64>, Option<u64>)>,
{
    let (numerator, denominator) = pairs
        .into_iter()
        .filter_map(|(score, emp)| Some((score?, emp? as f64)))
        .fold((0.0, 0.0), |(num, den), (score, emp)| (num + emp * score, den + emp));

    if denominator <= 0.0 {
        return None;
    }
    let mean = numerator / denominator;
    mean.is_finite().then_some(mean)
}

/// Mean of the non-missing scores
#[must_use]
pub fn simple_average<I>(scores: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, count) = scores
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), score| (sum + score, count + 1));

    if count == 0 {
        return None;
    }
    let mean = sum / count as f64;
    mean.is_finite().then_some(mean)
}

/// Grid cell shared by every metric
struct Cell<'a> {
    level: Level,
    code: &'a OccupationCode,
    year: i32,
    n_children: u32,
}

/// Count children of `group` with at least one raw row in `year`
fn count_children(map: &TaxonomyMap, scores: &RawScoreTable, group: &OccupationCode, year: i32) -> u32 {
    if group.level() == Level::Four {
        return 1;
    }
    let present = map
        .children_of(group)
        .into_iter()
        .filter(|child| map.members(child).iter().any(|leaf| scores.contains(leaf, year)))
        .count();
    u32::try_from(present).unwrap_or(u32::MAX)
}

fn build_cells<'a>(
    map: &'a TaxonomyMap,
    scores: &RawScoreTable,
    levels: &[Level],
    years: &[i32],
) -> Vec<Cell<'a>> {
    let mut cells = Vec::new();
    for &level in levels {
        let groups = map.groups(level);
        for &year in years {
            for &code in &groups {
                cells.push(Cell {
                    level,
                    code,
                    year,
                    n_children: count_children(map, scores, code, year),
                });
            }
        }
    }
    cells
}

/// Aggregate raw scores over the hierarchy of `map`
///
/// # Arguments
/// * `map` - Hierarchy of the taxonomy; its groups define the grid
/// * `scores` - Raw 4-digit scores of the same taxonomy
/// * `employment` - Employment counts of the same taxonomy
/// * `options` - Levels, years and employment-year policy
///
/// # Returns
/// Records ordered by metric, then level, year, code and weighting. Ranks
/// are left empty for [`rank_table`](crate::aggregate::rank_table).
pub fn aggregate(
    map: &TaxonomyMap,
    scores: &RawScoreTable,
    employment: &EmploymentTable,
    options: &AggregationOptions,
) -> Result<AggregatedTable> {
    let taxonomy = map.taxonomy();
    if employment.taxonomy() != taxonomy {
        return Err(DaioeError::aggregation_data(
            format!("{taxonomy} employment"),
            format!("employment table belongs to {}", employment.taxonomy()),
        ));
    }

    let start = Instant::now();
    let levels = options.sorted_levels();
    let years = options.years_to_emit(&scores.years());
    let cells = build_cells(map, scores, &levels, &years);
    debug!(
        "[{taxonomy}] {} grid cells over {} years, {} metrics",
        cells.len(),
        years.len(),
        scores.metrics().len()
    );

    // Employment year used for each emitted year
    let weight_years: FxHashMap<i32, Option<i32>> = years
        .iter()
        .map(|&y| (y, employment.weight_year(y, options.employment_year)))
        .collect();
    let employment_of = |leaf: &OccupationCode, year: i32| {
        weight_years
            .get(&year)
            .copied()
            .flatten()
            .and_then(|wy| employment.get(leaf, wy))
    };

    let shards: Vec<Vec<AggregatedRecord>> = scores
        .metrics()
        .par_iter()
        .enumerate()
        .map(|(metric_idx, metric)| {
            let mut records = Vec::with_capacity(cells.len() * Weighting::ALL.len());
            for cell in &cells {
                let (weighted, simple) = if cell.level == Level::Four {
                    let score = scores.score(cell.code, cell.year, metric_idx);
                    (score, score)
                } else {
                    let members = map.members(cell.code);
                    let member_scores: Vec<Option<f64>> = members
                        .iter()
                        .map(|leaf| scores.score(leaf, cell.year, metric_idx))
                        .collect();
                    let weighted = weighted_mean(
                        members
                            .iter()
                            .zip(&member_scores)
                            .map(|(leaf, score)| (*score, employment_of(leaf, cell.year))),
                    );
                    (weighted, simple_average(member_scores))
                };

                for (weighting, value) in [
                    (Weighting::EmploymentWeighted, weighted),
                    (Weighting::SimpleAverage, simple),
                ] {
                    records.push(AggregatedRecord {
                        taxonomy,
                        level: cell.level,
                        code: cell.code.clone(),
                        label: map.label(cell.code).to_string(),
                        year: cell.year,
                        metric: metric.clone(),
                        weighting,
                        value,
                        pct_rank: None,
                        n_children: cell.n_children,
                    });
                }
            }
            records
        })
        .collect();

    let records: Vec<AggregatedRecord> = shards.into_iter().flatten().collect();
    info!(
        "[{taxonomy}] aggregated {} records ({} with values) in {:?}",
        records.len(),
        records.iter().filter(|r| r.value.is_some()).count(),
        start.elapsed()
    );
    AggregatedTable::new(taxonomy, records)
}
