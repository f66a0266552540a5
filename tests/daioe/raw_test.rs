use daioe_explorer::daioe::{load_label_translations, load_raw_index};
use daioe_explorer::{DaioeError, Level, Taxonomy};

use crate::utils::{SCENARIO_RAW, code, test_config, write_raw};

#[test]
fn test_loads_hierarchy_scores_and_labels() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let path = write_raw(&config, Taxonomy::Ssyk2012, SCENARIO_RAW);

    let raw = load_raw_index(&path, Taxonomy::Ssyk2012, '\t').unwrap();

    assert_eq!(raw.scores.metrics(), ["genai", "allapps"]);
    assert_eq!(raw.scores.len(), 5);
    assert_eq!(raw.scores.years(), [2021, 2022]);
    assert_eq!(raw.scores.score(&code("2511"), 2022, 0), Some(80.0));
    // NA and blank cells are explicit gaps, the rows stay
    assert!(raw.scores.contains(&code("2512"), 2022));
    assert_eq!(raw.scores.score(&code("2512"), 2022, 0), None);
    assert_eq!(raw.scores.score(&code("2521"), 2022, 1), None);

    assert_eq!(raw.map.len(), 4);
    assert_eq!(raw.map.members(&code("25")).len(), 3);
    assert_eq!(raw.map.label(&code("25")), "IT-specialister");
    assert_eq!(raw.map.label(&code("2511")), "Systemanalytiker och IT-arkitekter");
}

#[test]
fn test_zero_padding_and_explicit_groups() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let content = "year\tssyk96_1\tssyk96_2\tssyk96_3\tssyk96_4\tdaioe_genai\n\
                   2020\t0 Militärer\t1 Officerare\t11 Officerare\t110 Officerare\t12.5\n\
                   2020\t\t\t\t3111 Tekniker\t1.0\n";
    let path = write_raw(&config, Taxonomy::Ssyk96, content);

    let raw = load_raw_index(&path, Taxonomy::Ssyk96, '\t').unwrap();

    let lineage = raw.map.lineage(&code("0110")).unwrap();
    assert_eq!(lineage.group(Level::Three).as_str(), "011");
    assert_eq!(lineage.group(Level::Two).as_str(), "01");
    assert_eq!(lineage.group(Level::One).as_str(), "0");
    // Blank group cells fall back to truncation
    let lineage = raw.map.lineage(&code("3111")).unwrap();
    assert_eq!(lineage.group(Level::Two).as_str(), "31");
}

#[test]
fn test_duplicate_rows_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let content = "year\tssyk96_1\tssyk96_2\tssyk96_3\tssyk96_4\tdaioe_genai\n\
                   2020\t2 A\t25 B\t251 C\t2511 D\t1\n\
                   2020\t2 A\t25 B\t251 C\t2511 D\t2\n";
    let path = write_raw(&config, Taxonomy::Ssyk96, content);

    let err = load_raw_index(&path, Taxonomy::Ssyk96, '\t').unwrap_err();
    match err {
        DaioeError::AggregationData { key, .. } => assert!(key.contains("2511")),
        other => panic!("expected an aggregation data error, got {other}"),
    }
}

#[test]
fn test_schema_errors() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let no_metrics = "year\tssyk96_1\tssyk96_2\tssyk96_3\tssyk96_4\n2020\t2\t25\t251\t2511\n";
    let path = write_raw(&config, Taxonomy::Ssyk96, no_metrics);
    assert!(matches!(load_raw_index(&path, Taxonomy::Ssyk96, '\t'), Err(DaioeError::Schema(_))));

    // Level columns of the other taxonomy
    let path = write_raw(&config, Taxonomy::Ssyk2012, SCENARIO_SSYK96_HEADER);
    assert!(matches!(load_raw_index(&path, Taxonomy::Ssyk2012, '\t'), Err(DaioeError::Schema(_))));
}

const SCENARIO_SSYK96_HEADER: &str = "year\tssyk96_1\tssyk96_2\tssyk96_3\tssyk96_4\tdaioe_genai\n";

#[test]
fn test_label_translations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ssyk2012_labels.csv");
    std::fs::write(&path, "level,code,name\n4,110,Commissioned armed forces officers\n2,25,ICT professionals\n3,251,\n").unwrap();

    let labels = load_label_translations(&path).unwrap();
    assert_eq!(
        labels,
        [
            (code("0110"), "Commissioned armed forces officers".to_string()),
            (code("25"), "ICT professionals".to_string()),
        ]
    );
}
