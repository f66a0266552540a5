use daioe_explorer::artifact::{artifact_path, load_table};
use daioe_explorer::employment::snapshot::read_latest_snapshot;
use daioe_explorer::{
    DaioeError, EmploymentYearPolicy, Level, Pipeline, PipelineConfig, RefreshStatus, SnapshotProvider, Taxonomy, Weighting,
};

use crate::utils::fixtures::{InMemoryProvider, SyntheticData};
use crate::utils::{SCENARIO_RAW, find, scenario_employment, test_config, write_raw};

/// Data directory with raw files for both taxonomies
fn setup() -> (tempfile::TempDir, PipelineConfig, InMemoryProvider) {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_raw(&config, Taxonomy::Ssyk2012, SCENARIO_RAW);

    let mut synthetic = SyntheticData::new(Taxonomy::Ssyk96, 42, 12, vec![2019, 2020, 2021], &["genai", "allapps"]).unwrap();
    synthetic.write_raw_file(&config.raw_dir()).unwrap();
    let provider = InMemoryProvider::new()
        .with_table(scenario_employment())
        .with_table(synthetic.employment(2021).unwrap());

    (dir, config, provider)
}

#[tokio::test]
async fn test_refresh_writes_both_taxonomies() {
    let (_dir, config, provider) = setup();
    let pipeline = Pipeline::new(config.clone()).unwrap();

    let summaries = pipeline.refresh(&provider, &Taxonomy::ALL, true).await;

    assert_eq!(summaries.len(), 2);
    assert!(summaries.iter().all(|s| s.is_success()), "{summaries:?}");
    for taxonomy in Taxonomy::ALL {
        let table = load_table(&config.aggregated_dir(), taxonomy).unwrap().unwrap();
        assert_eq!(table.taxonomy(), taxonomy);
        assert!(!table.is_empty());
        assert!(read_latest_snapshot(&config.scb_dir(), taxonomy, &config.language).unwrap().is_some());
    }
}

#[tokio::test]
async fn test_refreshing_one_taxonomy_leaves_the_other_byte_identical() {
    let (_dir, config, provider) = setup();
    let pipeline = Pipeline::new(config.clone()).unwrap();
    pipeline.refresh(&provider, &Taxonomy::ALL, false).await;

    let ssyk2012 = artifact_path(&config.aggregated_dir(), Taxonomy::Ssyk2012);
    let before = std::fs::read(&ssyk2012).unwrap();

    let summaries = pipeline.refresh(&provider, &[Taxonomy::Ssyk96], false).await;
    assert!(summaries[0].is_success());
    assert_eq!(std::fs::read(&ssyk2012).unwrap(), before);
}

#[tokio::test]
async fn test_provider_failure_keeps_previous_artifact() {
    let (_dir, config, provider) = setup();
    let pipeline = Pipeline::new(config.clone()).unwrap();
    pipeline.refresh(&provider, &Taxonomy::ALL, false).await;

    let ssyk96 = artifact_path(&config.aggregated_dir(), Taxonomy::Ssyk96);
    let before = std::fs::read(&ssyk96).unwrap();

    let failing = provider.failing(Taxonomy::Ssyk96);
    let summaries = pipeline.refresh(&failing, &Taxonomy::ALL, false).await;

    assert!(summaries[0].is_success());
    match &summaries[1].status {
        RefreshStatus::KeptPrevious { error, artifact } => {
            assert!(matches!(error, DaioeError::DataSource { .. }));
            assert_eq!(artifact.as_deref(), Some(ssyk96.as_path()));
        }
        other => panic!("expected the previous artifact to be kept, got {other:?}"),
    }
    assert_eq!(std::fs::read(&ssyk96).unwrap(), before);
}

#[tokio::test]
async fn test_missing_raw_file_fails_only_that_taxonomy() {
    let (_dir, config, provider) = setup();
    std::fs::remove_file(config.raw_dir().join(Taxonomy::Ssyk96.raw_file_name())).unwrap();
    let pipeline = Pipeline::new(config.clone()).unwrap();

    let summaries = pipeline.refresh(&provider, &Taxonomy::ALL, false).await;

    assert!(summaries[0].is_success());
    assert!(matches!(summaries[1].status, RefreshStatus::Failed(DaioeError::Io { .. })));
    assert!(load_table(&config.aggregated_dir(), Taxonomy::Ssyk96).unwrap().is_none());
}

#[tokio::test]
async fn test_offline_refresh_uses_snapshot() {
    let (_dir, config, provider) = setup();
    let pipeline = Pipeline::new(config.clone()).unwrap();

    let offline = SnapshotProvider::new(config.scb_dir());
    let summaries = pipeline.refresh(&offline, &[Taxonomy::Ssyk2012], false).await;
    assert!(matches!(summaries[0].status, RefreshStatus::KeptPrevious { artifact: None, .. }));

    let pulled = pipeline.pull(&provider, &[Taxonomy::Ssyk2012]).await;
    assert!(pulled[0].result.is_ok());

    let online = pipeline.refresh(&provider, &[Taxonomy::Ssyk2012], false).await;
    let offline_run = pipeline.refresh(&offline, &[Taxonomy::Ssyk2012], false).await;
    assert!(online[0].is_success() && offline_run[0].is_success());

    let table = load_table(&config.aggregated_dir(), Taxonomy::Ssyk2012).unwrap().unwrap();
    let reference = {
        let pipeline = Pipeline::new(config.clone()).unwrap();
        pipeline.build_table(Taxonomy::Ssyk2012, &scenario_employment()).unwrap()
    };
    assert_eq!(table, reference);
}

#[tokio::test]
async fn test_offline_refresh_without_requested_year_keeps_artifact() {
    let (_dir, config, provider) = setup();
    let pipeline = Pipeline::new(config.clone()).unwrap();
    assert!(pipeline.pull(&provider, &[Taxonomy::Ssyk2012]).await[0].result.is_ok());
    assert!(pipeline.refresh(&provider, &[Taxonomy::Ssyk2012], false).await[0].is_success());

    let path = artifact_path(&config.aggregated_dir(), Taxonomy::Ssyk2012);
    let before = std::fs::read(&path).unwrap();

    // The snapshot only holds 2023
    let fixed = Pipeline::new(PipelineConfig {
        employment_year: EmploymentYearPolicy::Fixed(2019),
        ..config.clone()
    })
    .unwrap();
    let offline = SnapshotProvider::new(config.scb_dir());
    let summaries = fixed.refresh(&offline, &[Taxonomy::Ssyk2012], false).await;

    match &summaries[0].status {
        RefreshStatus::KeptPrevious { error, artifact } => {
            assert!(matches!(error, DaioeError::DataSource { .. }));
            assert_eq!(artifact.as_deref(), Some(path.as_path()));
        }
        other => panic!("expected the previous artifact to be kept, got {other:?}"),
    }
    assert_eq!(std::fs::read(&path).unwrap(), before);

    let kept = load_table(&config.aggregated_dir(), Taxonomy::Ssyk2012).unwrap().unwrap();
    let weighted = find(&kept, Level::Two, "25", 2022, "genai", Weighting::EmploymentWeighted);
    assert!(weighted.value.is_some());
}
