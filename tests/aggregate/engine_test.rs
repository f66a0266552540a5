use daioe_explorer::aggregate::{AggregationOptions, aggregate, rank_table};
use daioe_explorer::config::EmploymentYearPolicy;
use daioe_explorer::daioe::load_raw_index;
use daioe_explorer::{DaioeError, EmploymentTable, Level, RawIndex, Taxonomy, Weighting};

use crate::utils::{SCENARIO_RAW, assert_close, code, find, scenario_employment, test_config, write_raw};

fn scenario() -> (tempfile::TempDir, RawIndex) {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let path = write_raw(&config, Taxonomy::Ssyk2012, SCENARIO_RAW);
    let raw = load_raw_index(&path, Taxonomy::Ssyk2012, '\t').unwrap();
    (dir, raw)
}

#[test]
fn test_weighted_and_simple_disagree() {
    let (_dir, raw) = scenario();
    let table = aggregate(&raw.map, &raw.scores, &scenario_employment(), &AggregationOptions::default()).unwrap();

    let weighted = find(&table, Level::Two, "25", 2022, "genai", Weighting::EmploymentWeighted);
    let simple = find(&table, Level::Two, "25", 2022, "genai", Weighting::SimpleAverage);
    assert_close(weighted.value, 11_000.0 / 150.0);
    assert_close(simple.value, 70.0);
    assert_eq!(weighted.n_children, 2);
    assert_eq!(weighted.label, "IT-specialister");
}

#[test]
fn test_level_four_is_identity() {
    let (_dir, raw) = scenario();
    let table = aggregate(&raw.map, &raw.scores, &scenario_employment(), &AggregationOptions::default()).unwrap();

    for weighting in Weighting::ALL {
        assert_close(find(&table, Level::Four, "2511", 2022, "genai", weighting).value, 80.0);
        // No employment for 3111, yet the identity holds
        assert_close(find(&table, Level::Four, "3111", 2022, "genai", weighting).value, 40.0);
        assert_eq!(find(&table, Level::Four, "2512", 2022, "genai", weighting).value, None);
        assert_eq!(find(&table, Level::Four, "2512", 2022, "genai", weighting).n_children, 1);
    }
}

#[test]
fn test_missing_employment_nulls_weighted_only() {
    let (_dir, raw) = scenario();
    let table = aggregate(&raw.map, &raw.scores, &scenario_employment(), &AggregationOptions::default()).unwrap();

    assert_eq!(find(&table, Level::One, "3", 2022, "genai", Weighting::EmploymentWeighted).value, None);
    assert_close(find(&table, Level::One, "3", 2022, "genai", Weighting::SimpleAverage).value, 40.0);
}

#[test]
fn test_all_null_group_is_null_for_both() {
    let (_dir, raw) = scenario();
    let table = aggregate(&raw.map, &raw.scores, &scenario_employment(), &AggregationOptions::default()).unwrap();

    // 251 holds 2511 and 2512; in 2021 neither has a row
    for weighting in Weighting::ALL {
        let record = find(&table, Level::Three, "251", 2021, "genai", weighting);
        assert_eq!(record.value, None);
        assert_eq!(record.n_children, 0);
    }
    // 252 has only 2521, whose allapps cell is blank
    assert_eq!(find(&table, Level::Three, "252", 2022, "allapps", Weighting::SimpleAverage).value, None);
}

#[test]
fn test_complete_grid() {
    let (_dir, raw) = scenario();
    let table = aggregate(&raw.map, &raw.scores, &scenario_employment(), &AggregationOptions::default()).unwrap();

    let groups: usize = Level::ALL.iter().map(|&l| raw.map.groups(l).len()).sum();
    assert_eq!(groups, 2 + 2 + 3 + 4);
    assert_eq!(table.len(), groups * 2 * 2 * 2);
    assert_eq!(table.years(), [2021, 2022]);
    assert!(table.records().iter().all(|r| r.value.is_none_or(f64::is_finite)));
}

#[test]
fn test_weighted_mean_invariant_to_employment_scale() {
    let (_dir, raw) = scenario();
    let base = scenario_employment();
    let mut scaled = EmploymentTable::new(Taxonomy::Ssyk2012);
    for (leaf, year, count) in base.iter() {
        scaled.insert(leaf.clone(), year, count.map(|c| c * 7)).unwrap();
    }

    let options = AggregationOptions::default();
    let a = aggregate(&raw.map, &raw.scores, &base, &options).unwrap();
    let b = aggregate(&raw.map, &raw.scores, &scaled, &options).unwrap();
    for (x, y) in a.records().iter().zip(b.records()) {
        match (x.value, y.value) {
            (Some(x), Some(y)) => assert!((x - y).abs() < 1e-9),
            (x, y) => assert_eq!(x, y),
        }
    }
}

#[test]
fn test_simple_average_ignores_employment() {
    let (_dir, raw) = scenario();
    let options = AggregationOptions::default();
    let with = aggregate(&raw.map, &raw.scores, &scenario_employment(), &options).unwrap();
    let without = aggregate(&raw.map, &raw.scores, &EmploymentTable::new(Taxonomy::Ssyk2012), &options).unwrap();

    let simple = |t: &daioe_explorer::AggregatedTable| {
        t.records()
            .iter()
            .filter(|r| r.weighting == Weighting::SimpleAverage)
            .map(|r| r.value)
            .collect::<Vec<_>>()
    };
    assert_eq!(simple(&with), simple(&without));
    assert!(
        without
            .records()
            .iter()
            .filter(|r| r.weighting == Weighting::EmploymentWeighted && r.level != Level::Four)
            .all(|r| r.value.is_none())
    );
}

#[test]
fn test_empty_years_and_matching_policy() {
    let (_dir, raw) = scenario();
    let options = AggregationOptions {
        levels: vec![Level::Two],
        years: Some((2020, 2022)),
        emit_empty_years: true,
        employment_year: EmploymentYearPolicy::Matching,
    };
    let table = aggregate(&raw.map, &raw.scores, &scenario_employment(), &options).unwrap();

    assert_eq!(table.years(), [2020, 2021, 2022]);
    assert_eq!(table.len(), 2 * 3 * 2 * 2);
    assert!(table.records().iter().filter(|r| r.year == 2020).all(|r| r.value.is_none()));
    // Employment only exists for 2023, so matching leaves no weights
    assert_eq!(find(&table, Level::Two, "25", 2022, "genai", Weighting::EmploymentWeighted).value, None);
}

#[test]
fn test_ranks_fill_every_slice() {
    let (_dir, raw) = scenario();
    let mut table = aggregate(&raw.map, &raw.scores, &scenario_employment(), &AggregationOptions::default()).unwrap();
    rank_table(&mut table);

    assert_close(find(&table, Level::Two, "25", 2022, "genai", Weighting::SimpleAverage).pct_rank, 100.0);
    assert_close(find(&table, Level::Two, "31", 2022, "genai", Weighting::SimpleAverage).pct_rank, 50.0);
    // Only 25 has a weighted value at level 2 in 2022
    assert_close(find(&table, Level::Two, "25", 2022, "genai", Weighting::EmploymentWeighted).pct_rank, 100.0);
    assert_eq!(find(&table, Level::Two, "31", 2022, "genai", Weighting::EmploymentWeighted).pct_rank, None);

    for record in table.records() {
        assert_eq!(record.value.is_some(), record.pct_rank.is_some());
        if let Some(rank) = record.pct_rank {
            assert!((0.0..=100.0).contains(&rank));
        }
    }
}

#[test]
fn test_taxonomies_are_not_mixed() {
    let (_dir, raw) = scenario();
    let mut other = EmploymentTable::new(Taxonomy::Ssyk96);
    other.insert(code("2511"), 2023, Some(1)).unwrap();

    let err = aggregate(&raw.map, &raw.scores, &other, &AggregationOptions::default()).unwrap_err();
    assert!(matches!(err, DaioeError::AggregationData { .. }));
}
