//! Raw DAIOE sub-index scores
//!
//! The raw artifact is a delimited file with a `year` column, one
//! `<taxonomy>_<level>` column per level holding `"<code> <label>"`, and one
//! `daioe_*` column per metric. Other columns are ignored. Each row both
//! scores one occupation in one year and states that occupation's lineage.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use arrow::array::{Array, Float64Array, Int64Array, StringArray};
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema, UInt8Type};
use regex::Regex;

use crate::error::util::safe_open_file;
use crate::error::{DaioeError, Result};
use crate::taxonomy::{Level, Lineage, OccupationCode, Taxonomy, TaxonomyMap};
use crate::utils::arrow::{extract_f64, extract_string, primitive_column, string_column};
use crate::utils::logging::{log_operation_complete, log_operation_start, log_warning};

/// Prefix of metric columns in the raw file
pub const METRIC_PREFIX: &str = "daioe_";

/// Cells treated as missing
const NULL_PATTERN: &str = r"^(|NA|NaN|nan|null)$";

/// Scores keyed by 4-digit code and year, one slot per metric
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawScoreTable {
    metrics: Vec<String>,
    rows: BTreeMap<(OccupationCode, i32), Vec<Option<f64>>>,
}

impl RawScoreTable {
    /// Empty table for the given metric names
    #[must_use]
    pub fn new(metrics: Vec<String>) -> Self {
        Self {
            metrics,
            rows: BTreeMap::new(),
        }
    }

    /// Add the scores of one occupation and year.
    ///
    /// `scores` must have one slot per metric; a repeated key is an error.
    pub fn insert(&mut self, code: OccupationCode, year: i32, scores: Vec<Option<f64>>) -> Result<()> {
        let key = format!("raw row ({code}, {year})");
        if code.level() != Level::Four {
            return Err(DaioeError::aggregation_data(key, "scores must be keyed by 4-digit codes"));
        }
        if scores.len() != self.metrics.len() {
            return Err(DaioeError::aggregation_data(
                key,
                format!("expected {} scores, got {}", self.metrics.len(), scores.len()),
            ));
        }
        if self.rows.contains_key(&(code.clone(), year)) {
            return Err(DaioeError::aggregation_data(key, "duplicate occupation and year"));
        }
        let scores = scores
            .into_iter()
            .map(|s| s.filter(|v| v.is_finite()))
            .collect();
        self.rows.insert((code, year), scores);
        Ok(())
    }

    /// Metric names without the `daioe_` prefix, in file order
    #[must_use]
    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    /// Whether a row exists, even if all of its scores are missing
    #[must_use]
    pub fn contains(&self, code: &OccupationCode, year: i32) -> bool {
        self.rows.contains_key(&(code.clone(), year))
    }

    /// Score of metric `metric` for an occupation and year
    #[must_use]
    pub fn score(&self, code: &OccupationCode, year: i32, metric: usize) -> Option<f64> {
        self.rows
            .get(&(code.clone(), year))
            .and_then(|scores| scores.get(metric).copied().flatten())
    }

    /// Sorted distinct years
    #[must_use]
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.rows.keys().map(|(_, y)| *y).collect();
        years.sort_unstable();
        years.dedup();
        years
    }

    /// Number of (code, year) rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Contents of one raw file: the hierarchy it encodes and its scores
#[derive(Debug, Clone)]
pub struct RawIndex {
    pub map: TaxonomyMap,
    pub scores: RawScoreTable,
}

/// Split `"<code> <label>"` on the first space
fn split_code_label(cell: &str) -> (&str, &str) {
    match cell.trim().split_once(' ') {
        Some((code, label)) => (code, label.trim()),
        None => (cell.trim(), ""),
    }
}

/// Delimiter byte and null pattern shared by schema inference and reading
fn csv_dialect(separator: char) -> Result<(u8, Regex)> {
    let delimiter = u8::try_from(separator)
        .map_err(|_| DaioeError::Config(format!("separator {separator:?} is not a single byte")))?;
    let null_regex = Regex::new(NULL_PATTERN)
        .map_err(|e| DaioeError::Config(format!("invalid null pattern: {e}")))?;
    Ok((delimiter, null_regex))
}

/// Column types for the raw file: metrics are floats, `year` an integer,
/// everything else text.
fn raw_schema(inferred: &Schema) -> Schema {
    let fields: Vec<Field> = inferred
        .fields()
        .iter()
        .map(|field| {
            let name = field.name();
            let data_type = if name == "year" {
                DataType::Int64
            } else if name.starts_with(METRIC_PREFIX) {
                DataType::Float64
            } else {
                DataType::Utf8
            };
            Field::new(name, data_type, true)
        })
        .collect();
    Schema::new(fields)
}

fn check_columns(schema: &Schema, taxonomy: Taxonomy) -> Result<Vec<String>> {
    let mut required = vec!["year".to_string()];
    required.extend(Level::ALL.map(|level| taxonomy.level_column(level)));
    let missing: Vec<&String> = required
        .iter()
        .filter(|name| schema.field_with_name(name).is_err())
        .collect();
    if !missing.is_empty() {
        return Err(DaioeError::Schema(format!(
            "raw {taxonomy} file is missing columns: {missing:?}"
        )));
    }

    let metrics: Vec<String> = schema
        .fields()
        .iter()
        .filter(|f| f.name().starts_with(METRIC_PREFIX))
        .map(|f| f.name().clone())
        .collect();
    if metrics.is_empty() {
        return Err(DaioeError::Schema(format!(
            "raw {taxonomy} file has no '{METRIC_PREFIX}*' metric columns"
        )));
    }
    Ok(metrics)
}

/// Load the raw score file for `taxonomy`
///
/// # Arguments
/// * `path` - Raw file, usually `01_daioe_raw/daioe_<taxonomy>.csv`
/// * `taxonomy` - Taxonomy whose level columns are read
/// * `separator` - Field separator (tab for the published files)
///
/// # Errors
/// Returns a schema error when required columns are missing and an
/// aggregation data error for malformed codes, years or duplicate rows.
pub fn load_raw_index(path: &Path, taxonomy: Taxonomy, separator: char) -> Result<RawIndex> {
    let start = Instant::now();
    log_operation_start("Loading raw DAIOE scores from", path);

    let (delimiter, null_regex) = csv_dialect(separator)?;
    let (inferred, _) = Format::default()
        .with_header(true)
        .with_delimiter(delimiter)
        .with_null_regex(null_regex.clone())
        .infer_schema(safe_open_file(path, "raw DAIOE scores")?, Some(100))?;
    let schema = Arc::new(raw_schema(&inferred));
    let metric_columns = check_columns(&schema, taxonomy)?;

    let reader = ReaderBuilder::new(schema)
        .with_header(true)
        .with_delimiter(delimiter)
        .with_null_regex(null_regex)
        .build(safe_open_file(path, "raw DAIOE scores")?)?;

    let level_columns = Level::ALL.map(|level| taxonomy.level_column(level));
    let metrics = metric_columns
        .iter()
        .map(|name| name.trim_start_matches(METRIC_PREFIX).to_string())
        .collect();
    let mut scores = RawScoreTable::new(metrics);
    let mut builder = TaxonomyMap::builder(taxonomy);
    let mut line = 1usize;

    for batch in reader {
        let batch = batch?;
        let years: &Int64Array = primitive_column::<Int64Type>(&batch, "year")?;
        let levels: Vec<&StringArray> = level_columns
            .iter()
            .map(|name| string_column(&batch, name))
            .collect::<Result<_>>()?;
        let metric_arrays: Vec<&Float64Array> = metric_columns
            .iter()
            .map(|name| primitive_column::<Float64Type>(&batch, name))
            .collect::<Result<_>>()?;

        for row in 0..batch.num_rows() {
            line += 1;
            let leaf_cell = extract_string(levels[3], row).ok_or_else(|| {
                DaioeError::aggregation_data(format!("{taxonomy} line {line}"), "missing 4-digit code")
            })?;
            let (leaf_code, leaf_label) = split_code_label(leaf_cell);
            let leaf = OccupationCode::at_level(leaf_code, Level::Four)?;

            if years.is_null(row) {
                return Err(DaioeError::aggregation_data(
                    format!("{taxonomy} line {line} ({leaf})"),
                    "missing year",
                ));
            }
            let year = i32::try_from(years.value(row)).map_err(|_| {
                DaioeError::aggregation_data(
                    format!("{taxonomy} line {line} ({leaf})"),
                    format!("year {} is out of range", years.value(row)),
                )
            })?;

            // Group columns are authoritative; a blank cell falls back to truncation
            let fallback = Lineage::from_truncation(&leaf)?;
            let mut codes = [
                fallback.group(Level::One).clone(),
                fallback.group(Level::Two).clone(),
                fallback.group(Level::Three).clone(),
                leaf.clone(),
            ];
            let mut labels = ["", "", "", leaf_label];
            for (idx, level) in [Level::One, Level::Two, Level::Three].into_iter().enumerate() {
                if let Some(cell) = extract_string(levels[idx], row) {
                    let (code, label) = split_code_label(cell);
                    codes[idx] = OccupationCode::at_level(code, level)?;
                    labels[idx] = label;
                }
            }
            builder.insert_lineage(Lineage::new(codes)?, labels)?;

            let row_scores = metric_arrays.iter().map(|a| extract_f64(a, row)).collect();
            scores.insert(leaf, year, row_scores)?;
        }
    }

    let map = builder.build();
    if map.is_empty() {
        log_warning("Raw DAIOE file has no rows", Some(path));
    }
    log_operation_complete("loaded", path, scores.len(), Some(start.elapsed()));
    Ok(RawIndex { map, scores })
}

/// Load label translations from a `level,code,name` CSV
///
/// Codes are zero-padded to their level; rows with a blank name are skipped.
pub fn load_label_translations(path: &Path) -> Result<Vec<(OccupationCode, String)>> {
    let schema = Schema::new(vec![
        Field::new("level", DataType::UInt8, false),
        Field::new("code", DataType::Utf8, false),
        Field::new("name", DataType::Utf8, true),
    ]);
    let reader = ReaderBuilder::new(Arc::new(schema))
        .with_header(true)
        .build(safe_open_file(path, "label translations")?)?;

    let mut labels = Vec::new();
    for batch in reader {
        let batch = batch?;
        let levels = primitive_column::<UInt8Type>(&batch, "level")?;
        let codes = string_column(&batch, "code")?;
        let names = string_column(&batch, "name")?;
        for row in 0..batch.num_rows() {
            let Some(name) = extract_string(names, row) else {
                continue;
            };
            let level = Level::try_from(levels.value(row))?;
            let code = OccupationCode::at_level(codes.value(row), level)?;
            labels.push((code, name.to_string()));
        }
    }
    Ok(labels)
}
