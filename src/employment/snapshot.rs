//! On-disk snapshot of the last employment pull
//!
//! A pull is stored as `<taxonomy>_<lang>_<latest year>.csv` with columns
//! `taxonomy,year,level,code,value`, holding level-4 counts and their sums at
//! levels 1-3. Only the level-4 rows are read back.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use arrow::array::{Array, ArrayRef, Int32Array, StringArray, UInt8Array, UInt64Array};
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType, Field, Int32Type, Schema, UInt8Type, UInt64Type};
use arrow::record_batch::RecordBatch;

use crate::employment::{EmploymentProvider, EmploymentTable, FetchFuture, YearSelection};
use crate::error::util::{latest_file_by, safe_open_file};
use crate::error::{DaioeError, Result};
use crate::taxonomy::{Level, Lineage, OccupationCode, Taxonomy};
use crate::utils::arrow::{primitive_column, string_column};
use crate::utils::io::write_atomically;
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// Schema of the snapshot file
#[must_use]
pub fn snapshot_schema() -> Schema {
    Schema::new(vec![
        Field::new("taxonomy", DataType::Utf8, false),
        Field::new("year", DataType::Int32, false),
        Field::new("level", DataType::UInt8, false),
        Field::new("code", DataType::Utf8, false),
        Field::new("value", DataType::UInt64, true),
    ])
}

/// Sum counts over groups; a group whose leaves are all unreported stays `None`.
fn rollup(table: &EmploymentTable) -> Result<BTreeMap<(i32, Level, OccupationCode), Option<u64>>> {
    let mut sums = BTreeMap::new();
    for (leaf, year, count) in table.iter() {
        let lineage = Lineage::from_truncation(leaf)?;
        let mut codes = lineage.ancestors();
        codes.insert(0, lineage.leaf());
        for code in codes {
            let slot = sums.entry((year, code.level(), code.clone())).or_insert(None);
            if let Some(count) = count {
                *slot = Some(slot.unwrap_or(0) + count);
            }
        }
    }
    Ok(sums)
}

/// Convert a table to a snapshot record batch, sorted by year, level and code
pub fn to_record_batch(table: &EmploymentTable) -> Result<RecordBatch> {
    let sums = rollup(table)?;
    let taxonomy = table.taxonomy().as_str();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(vec![taxonomy; sums.len()])),
        Arc::new(Int32Array::from_iter_values(sums.keys().map(|(y, _, _)| *y))),
        Arc::new(UInt8Array::from_iter_values(sums.keys().map(|(_, l, _)| u8::from(*l)))),
        Arc::new(StringArray::from_iter_values(sums.keys().map(|(_, _, c)| c.as_str()))),
        Arc::new(UInt64Array::from(sums.values().copied().collect::<Vec<_>>())),
    ];
    Ok(RecordBatch::try_new(Arc::new(snapshot_schema()), columns)?)
}

/// Path of the snapshot for a table
#[must_use]
pub fn snapshot_path(dir: &Path, table: &EmploymentTable, language: &str) -> PathBuf {
    let year = table
        .latest_year()
        .map_or_else(|| "unknown".to_string(), |y| y.to_string());
    dir.join(format!("{}_{language}_{year}.csv", table.taxonomy()))
}

/// Write a snapshot, replacing any previous file of the same name
pub fn write_snapshot(dir: &Path, table: &EmploymentTable, language: &str) -> Result<PathBuf> {
    let start = Instant::now();
    let path = snapshot_path(dir, table, language);
    let batch = to_record_batch(table)?;

    write_atomically(&path, |w| {
        let mut writer = WriterBuilder::new().with_header(true).build(w);
        writer.write(&batch)?;
        Ok(())
    })?;

    log_operation_complete("wrote", &path, batch.num_rows(), Some(start.elapsed()));
    Ok(path)
}

/// Read the level-4 rows of a snapshot file
pub fn read_snapshot(path: &Path, taxonomy: Taxonomy) -> Result<EmploymentTable> {
    log_operation_start("Reading employment snapshot", path);
    let file = safe_open_file(path, "employment snapshot")?;
    let reader = ReaderBuilder::new(Arc::new(snapshot_schema()))
        .with_header(true)
        .build(file)?;

    let mut table = EmploymentTable::new(taxonomy);
    for batch in reader {
        let batch = batch?;
        let taxonomies = string_column(&batch, "taxonomy")?;
        let years = primitive_column::<Int32Type>(&batch, "year")?;
        let levels = primitive_column::<UInt8Type>(&batch, "level")?;
        let codes = string_column(&batch, "code")?;
        let values = primitive_column::<UInt64Type>(&batch, "value")?;

        for row in 0..batch.num_rows() {
            if levels.value(row) != u8::from(Level::Four) {
                continue;
            }
            let key = format!("snapshot row ({}, {})", codes.value(row), years.value(row));
            let row_taxonomy: Taxonomy = taxonomies.value(row).parse()?;
            if row_taxonomy != taxonomy {
                return Err(DaioeError::aggregation_data(
                    key,
                    format!("belongs to {row_taxonomy}, expected {taxonomy}"),
                ));
            }
            let code = OccupationCode::at_level(codes.value(row), Level::Four)?;
            let count = (!values.is_null(row)).then(|| values.value(row));
            table.insert(code, years.value(row), count)?;
        }
    }

    log_operation_complete("read", path, table.len(), None);
    Ok(table)
}

/// Latest year in a snapshot file stem `<taxonomy>_<language>_<year>`
fn snapshot_year(stem: &str, taxonomy: Taxonomy, language: &str) -> Option<i32> {
    stem.strip_prefix(taxonomy.as_str())?
        .strip_prefix('_')?
        .strip_prefix(language)?
        .strip_prefix('_')?
        .parse()
        .ok()
}

/// Newest snapshot for `taxonomy` and `language` in `dir`, if any.
///
/// The newest file is the one with the highest year in its name; files
/// without a year are ignored.
pub fn read_latest_snapshot(dir: &Path, taxonomy: Taxonomy, language: &str) -> Result<Option<EmploymentTable>> {
    match latest_file_by(dir, "csv", |stem| snapshot_year(stem, taxonomy, language))? {
        Some(path) => read_snapshot(&path, taxonomy).map(Some),
        None => Ok(None),
    }
}

/// Provider serving the last pulled snapshot, for offline refreshes
#[derive(Debug, Clone)]
pub struct SnapshotProvider {
    dir: PathBuf,
    language: String,
}

impl SnapshotProvider {
    /// Provider reading English snapshots from `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            language: "en".to_string(),
        }
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Latest snapshot restricted to the selected years.
    ///
    /// A snapshot holding none of the requested years is a data source
    /// failure, the same as an SCB table without them.
    fn load(&self, taxonomy: Taxonomy, years: &YearSelection) -> Result<EmploymentTable> {
        let mut table = read_latest_snapshot(&self.dir, taxonomy, &self.language)?.ok_or_else(|| {
            DaioeError::data_source(format!(
                "no employment snapshot for {taxonomy} in {}; run a pull first",
                self.dir.display()
            ))
        })?;
        let available = table.years();
        let selected = years.select(&available);
        if selected.is_empty() {
            return Err(DaioeError::data_source(format!(
                "{taxonomy} snapshot has none of the requested years (available: {available:?})"
            )));
        }
        table.retain_years(&selected);
        Ok(table)
    }
}

impl EmploymentProvider for SnapshotProvider {
    fn name(&self) -> &str {
        "snapshot"
    }

    fn fetch<'a>(&'a self, taxonomy: Taxonomy, years: &'a YearSelection) -> FetchFuture<'a> {
        Box::pin(async move { self.load(taxonomy, years) })
    }
}
