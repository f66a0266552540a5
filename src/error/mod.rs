//! Error handling for the aggregation pipeline.
//!
//! Null scores and missing employment counts are ordinary data and never
//! surface here; these variants are reserved for conditions that stop a run.

pub mod util;

use std::io;
use std::path::{Path, PathBuf};

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

/// Specialized error type for the pipeline
#[derive(Debug, thiserror::Error)]
pub enum DaioeError {
    /// The taxonomy identifier is not one of the supported SSYK versions
    #[error("Unknown taxonomy '{0}' (expected one of: ssyk2012, ssyk96)")]
    UnknownTaxonomy(String),

    /// Network, HTTP or payload failure while talking to the employment provider
    #[error("Data source error: {message}")]
    DataSource {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Malformed or duplicate-keyed input rows
    #[error("Aggregation data error at {key}: {message}")]
    AggregationData { key: String, message: String },

    /// A tabular input or artifact does not have the expected columns
    #[error("Schema error: {0}")]
    Schema(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error opening, reading or replacing a file
    #[error("IO error: {context}{}", path_suffix(.path))]
    Io {
        context: String,
        path: Option<PathBuf>,
        #[source]
        source: io::Error,
    },

    /// Error processing Arrow data
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Error processing Parquet data
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Error converting typed records to or from record batches
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_arrow::Error),

    /// Error decoding JSON (configuration files, provider payloads)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" ({})", p.display()))
        .unwrap_or_default()
}

impl DaioeError {
    /// Provider failure without an underlying error value
    pub fn data_source(message: impl Into<String>) -> Self {
        Self::DataSource {
            message: message.into(),
            source: None,
        }
    }

    /// Provider failure caused by another error
    pub fn data_source_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::DataSource {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Offending row identified by `key`
    pub fn aggregation_data(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AggregationData {
            key: key.into(),
            message: message.into(),
        }
    }

    /// IO failure with a description of what was being attempted
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            path: None,
            source,
        }
    }

    /// Attach a path to an IO error; other variants are returned unchanged
    #[must_use]
    pub fn with_path(self, path: &Path) -> Self {
        match self {
            Self::Io {
                context, source, ..
            } => Self::Io {
                context,
                path: Some(path.to_path_buf()),
                source,
            },
            other => other,
        }
    }

    /// Whether a refresh may fall back to the last materialized artifact
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::DataSource { .. })
    }
}

impl From<reqwest::Error> for DaioeError {
    fn from(error: reqwest::Error) -> Self {
        let message = match error.status() {
            Some(status) => format!("request failed with HTTP {status}"),
            None if error.is_timeout() => "request timed out".to_string(),
            None if error.is_decode() => "could not decode provider payload".to_string(),
            None => "request failed".to_string(),
        };
        Self::data_source_with(message, error)
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, DaioeError>;
