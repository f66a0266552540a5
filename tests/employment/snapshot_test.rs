use daioe_explorer::employment::snapshot::{read_latest_snapshot, read_snapshot, write_snapshot};
use daioe_explorer::employment::{EmploymentProvider, YearSelection};
use daioe_explorer::{DaioeError, EmploymentTable, SnapshotProvider, Taxonomy};

use crate::utils::{code, scenario_employment};

#[test]
fn test_snapshot_round_trip_keeps_unknown_counts() {
    let dir = tempfile::tempdir().unwrap();
    let table = scenario_employment();

    let path = write_snapshot(dir.path(), &table, "en").unwrap();
    assert_eq!(path.file_name().unwrap(), "ssyk2012_en_2023.csv");

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("taxonomy,year,level,code,value"));
    // Level 2 group 25 sums its three reported leaves
    assert!(content.contains("ssyk2012,2023,2,25,200"));

    let reread = read_snapshot(&path, Taxonomy::Ssyk2012).unwrap();
    assert_eq!(reread, table);
    assert_eq!(reread.get(&code("3111"), 2023), None);
}

#[test]
fn test_latest_snapshot_wins() {
    let dir = tempfile::tempdir().unwrap();
    let mut older = EmploymentTable::new(Taxonomy::Ssyk96);
    older.insert(code("2511"), 2020, Some(1)).unwrap();
    let mut newer = EmploymentTable::new(Taxonomy::Ssyk96);
    newer.insert(code("2511"), 2022, Some(2)).unwrap();

    write_snapshot(dir.path(), &older, "en").unwrap();
    write_snapshot(dir.path(), &newer, "en").unwrap();
    write_snapshot(dir.path(), &scenario_employment(), "en").unwrap();

    let latest = read_latest_snapshot(dir.path(), Taxonomy::Ssyk96, "en").unwrap().unwrap();
    assert_eq!(latest, newer);
}

#[test]
fn test_latest_snapshot_ignores_other_languages_and_undated_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut english = EmploymentTable::new(Taxonomy::Ssyk96);
    english.insert(code("2511"), 2021, Some(1)).unwrap();
    let mut swedish = EmploymentTable::new(Taxonomy::Ssyk96);
    swedish.insert(code("2511"), 2023, Some(2)).unwrap();

    write_snapshot(dir.path(), &english, "en").unwrap();
    write_snapshot(dir.path(), &swedish, "sv").unwrap();
    // An empty pull has no year and is written as ..._unknown.csv
    let undated = write_snapshot(dir.path(), &EmploymentTable::new(Taxonomy::Ssyk96), "en").unwrap();
    assert_eq!(undated.file_name().unwrap(), "ssyk96_en_unknown.csv");

    let latest = read_latest_snapshot(dir.path(), Taxonomy::Ssyk96, "en").unwrap().unwrap();
    assert_eq!(latest, english);
    let latest = read_latest_snapshot(dir.path(), Taxonomy::Ssyk96, "sv").unwrap().unwrap();
    assert_eq!(latest, swedish);
}

#[test]
fn test_snapshot_of_other_taxonomy_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_snapshot(dir.path(), &scenario_employment(), "en").unwrap();

    let err = read_snapshot(&path, Taxonomy::Ssyk96).unwrap_err();
    assert!(matches!(err, DaioeError::AggregationData { .. }));
}

#[tokio::test]
async fn test_snapshot_provider() {
    let dir = tempfile::tempdir().unwrap();
    let provider = SnapshotProvider::new(dir.path());

    let err = provider.fetch(Taxonomy::Ssyk2012, &YearSelection::Latest).await.unwrap_err();
    assert!(err.is_recoverable());

    write_snapshot(dir.path(), &scenario_employment(), "en").unwrap();
    let table = provider.fetch(Taxonomy::Ssyk2012, &YearSelection::Latest).await.unwrap();
    assert_eq!(table.len(), 4);

    // Years the snapshot does not hold are a provider failure, not an empty table
    let err = provider
        .fetch(Taxonomy::Ssyk2012, &YearSelection::Range(1990, 1995))
        .await
        .unwrap_err();
    assert!(matches!(err, DaioeError::DataSource { .. }));
    assert!(err.is_recoverable());
}
