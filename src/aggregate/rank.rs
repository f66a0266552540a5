//! Percentile ranks within (year, level, weighting, metric) slices

use rustc_hash::FxHashMap;

use crate::aggregate::{AggregatedTable, Weighting};
use crate::taxonomy::Level;

/// Percentile ranks of `values`, aligned with the input.
///
/// Uses the average rank for ties, scaled as `100 · rank / n` where `n`
/// counts the non-missing values. Missing values get no rank.
#[must_use]
pub fn percentile_ranks(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut present: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(idx, v)| v.filter(|v| v.is_finite()).map(|v| (idx, v)))
        .collect();
    present.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut ranks = vec![None; values.len()];
    let n = present.len() as f64;
    let mut start = 0;
    while start < present.len() {
        let mut end = start + 1;
        while end < present.len() && present[end].1 == present[start].1 {
            end += 1;
        }
        // 1-based positions start+1 ..= end share their mean
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        for &(idx, _) in &present[start..end] {
            ranks[idx] = Some(100.0 * avg_rank / n);
        }
        start = end;
    }
    ranks
}

/// Fill `pct_rank` on every record of `table`; slices are ranked independently.
pub fn rank_table(table: &mut AggregatedTable) {
    let mut slices: FxHashMap<(i32, Level, Weighting, String), Vec<usize>> = FxHashMap::default();
    for (idx, record) in table.records().iter().enumerate() {
        slices
            .entry((record.year, record.level, record.weighting, record.metric.clone()))
            .or_default()
            .push(idx);
    }

    let records = table.records_mut();
    for indices in slices.values() {
        let values: Vec<Option<f64>> = indices.iter().map(|&i| records[i].value).collect();
        for (&i, rank) in indices.iter().zip(percentile_ranks(&values)) {
            records[i].pct_rank = rank;
        }
    }
}
