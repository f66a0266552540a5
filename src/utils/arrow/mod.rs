//! Arrow data handling utilities
//!
//! Typed column lookup and null-aware value extraction for record batches
//! read from CSV and Parquet.

pub mod extractors;

pub use extractors::{column, extract_f64, extract_string, primitive_column, string_column};
