//! Aggregated table artifacts
//!
//! One Parquet file per taxonomy, `daioe_<taxonomy>_aggregated.parquet`,
//! replaced atomically on every refresh. Records are converted with
//! `serde_arrow` through a flat row type.

use std::path::{Path, PathBuf};
use std::time::Instant;

use arrow::csv::WriterBuilder;
use arrow::datatypes::{DataType, Field, FieldRef, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use serde::{Deserialize, Serialize};

use crate::aggregate::{AggregatedRecord, AggregatedTable, Weighting};
use crate::error::util::safe_open_file;
use crate::error::{DaioeError, Result};
use crate::taxonomy::{Level, OccupationCode, Taxonomy};
use crate::utils::io::write_atomically;
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// Metadata key holding the taxonomy of an artifact
pub const TAXONOMY_KEY: &str = "taxonomy";
/// Metadata key holding the generation timestamp (RFC 3339)
pub const GENERATED_AT_KEY: &str = "generated_at";

/// Flat artifact row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ArtifactRow {
    taxonomy: String,
    level: u8,
    code: String,
    label: String,
    year: i32,
    metric: String,
    weighting: String,
    value: Option<f64>,
    pct_rank: Option<f64>,
    n_children: u32,
}

impl ArtifactRow {
    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("taxonomy", DataType::Utf8, false),
            Field::new("level", DataType::UInt8, false),
            Field::new("code", DataType::Utf8, false),
            Field::new("label", DataType::Utf8, false),
            Field::new("year", DataType::Int32, false),
            Field::new("metric", DataType::Utf8, false),
            Field::new("weighting", DataType::Utf8, false),
            Field::new("value", DataType::Float64, true),
            Field::new("pct_rank", DataType::Float64, true),
            Field::new("n_children", DataType::UInt32, false),
        ])
    }

    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch> {
        let fields: Vec<FieldRef> = Self::schema().fields().iter().cloned().collect();
        Ok(serde_arrow::to_record_batch(&fields, &rows)?)
    }

    fn from_record_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        Ok(serde_arrow::from_record_batch(batch)?)
    }

    fn from_record(record: &AggregatedRecord) -> Self {
        Self {
            taxonomy: record.taxonomy.to_string(),
            level: record.level.into(),
            code: record.code.to_string(),
            label: record.label.clone(),
            year: record.year,
            metric: record.metric.clone(),
            weighting: record.weighting.to_string(),
            value: record.value,
            pct_rank: record.pct_rank,
            n_children: record.n_children,
        }
    }

    /// Validate and convert back into a record
    fn into_record(self, expected: Taxonomy) -> Result<AggregatedRecord> {
        let key = format!(
            "{} artifact row ({}, {}, {}, {})",
            self.taxonomy, self.code, self.year, self.metric, self.weighting
        );
        let taxonomy: Taxonomy = self.taxonomy.parse()?;
        if taxonomy != expected {
            return Err(DaioeError::aggregation_data(key, format!("expected taxonomy {expected}")));
        }
        let level = Level::try_from(self.level)?;
        let code = OccupationCode::parse(&self.code)?;
        if code.level() != level {
            return Err(DaioeError::aggregation_data(key, format!("code is not a level {level} code")));
        }
        let weighting: Weighting = self.weighting.parse()?;
        if self.pct_rank.is_some_and(|r| !(0.0..=100.0).contains(&r)) {
            return Err(DaioeError::aggregation_data(key, "percentile rank outside 0..=100"));
        }

        Ok(AggregatedRecord {
            taxonomy,
            level,
            code,
            label: self.label,
            year: self.year,
            metric: self.metric,
            weighting,
            value: self.value.filter(|v| v.is_finite()),
            pct_rank: self.pct_rank,
            n_children: self.n_children,
        })
    }
}

/// Artifact path of `taxonomy` inside `dir`
#[must_use]
pub fn artifact_path(dir: &Path, taxonomy: Taxonomy) -> PathBuf {
    dir.join(format!("daioe_{taxonomy}_aggregated.parquet"))
}

fn to_record_batch(table: &AggregatedTable) -> Result<RecordBatch> {
    let rows: Vec<ArtifactRow> = table.records().iter().map(ArtifactRow::from_record).collect();
    ArtifactRow::to_record_batch(&rows)
}

/// Write the artifact for `table`, replacing the previous one
///
/// Artifacts of other taxonomies in `dir` are not touched.
pub fn write_table(dir: &Path, table: &AggregatedTable) -> Result<PathBuf> {
    let start = Instant::now();
    let path = artifact_path(dir, table.taxonomy());
    let batch = to_record_batch(table)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_key_value_metadata(Some(vec![
            KeyValue::new(TAXONOMY_KEY.to_string(), table.taxonomy().to_string()),
            KeyValue::new(GENERATED_AT_KEY.to_string(), chrono::Utc::now().to_rfc3339()),
        ]))
        .build();

    write_atomically(&path, |w| {
        let mut writer = ArrowWriter::try_new(w, batch.schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    })?;

    log_operation_complete("wrote", &path, batch.num_rows(), Some(start.elapsed()));
    Ok(path)
}

/// Read and validate an artifact
///
/// # Errors
/// Fails when the file is missing or unreadable, its metadata lacks a known
/// taxonomy, or any row has an unknown level, weighting or a code whose
/// length does not match its level.
pub fn read_table(path: &Path) -> Result<AggregatedTable> {
    let start = Instant::now();
    log_operation_start("Reading aggregated table", path);

    let file = safe_open_file(path, "aggregated table")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let taxonomy: Taxonomy = builder
        .metadata()
        .file_metadata()
        .key_value_metadata()
        .and_then(|kv| kv.iter().find(|kv| kv.key == TAXONOMY_KEY))
        .and_then(|kv| kv.value.clone())
        .ok_or_else(|| DaioeError::Schema(format!("{} has no taxonomy metadata", path.display())))?
        .parse()?;

    let mut records = Vec::new();
    for batch in builder.build()? {
        for row in ArtifactRow::from_record_batch(&batch?)? {
            records.push(row.into_record(taxonomy)?);
        }
    }

    log_operation_complete("read", path, records.len(), Some(start.elapsed()));
    AggregatedTable::new(taxonomy, records)
}

/// Load the artifact of `taxonomy` from `dir`, `Ok(None)` if none exists yet
pub fn load_table(dir: &Path, taxonomy: Taxonomy) -> Result<Option<AggregatedTable>> {
    let path = artifact_path(dir, taxonomy);
    if !path.is_file() {
        return Ok(None);
    }
    read_table(&path).map(Some)
}

/// Export a table as CSV, replacing `path` atomically
pub fn export_csv(table: &AggregatedTable, path: &Path) -> Result<()> {
    let batch = to_record_batch(table)?;
    write_atomically(path, |w| {
        let mut writer = WriterBuilder::new().with_header(true).build(w);
        writer.write(&batch)?;
        Ok(())
    })?;
    log_operation_complete("exported", path, batch.num_rows(), None);
    Ok(())
}
