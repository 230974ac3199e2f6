//! Table sources and sinks the pipeline reads from and writes to
//!
//! The pipeline only needs two capabilities: load a projection of a named
//! table, and replace a set of named tables. Three backends are provided:
//!
//! - [`SqliteWarehouse`]: a SQLite database; all tables in one
//!   [`TableSink::overwrite_tables`] call are replaced in a single transaction
//! - [`FileWarehouse`]: one CSV or Parquet file per table in a directory
//! - [`MemoryWarehouse`]: frames held in a map, for tests and embedding

use crate::error::{ForecastError, Result};
use polars::prelude::*;

pub mod file;
pub mod memory;
pub mod sqlite;

pub use file::{FileFormat, FileWarehouse};
pub use memory::MemoryWarehouse;
pub use sqlite::SqliteWarehouse;

/// A frame to be stored under a table name
#[derive(Debug, Clone)]
pub struct NamedTable {
    pub name: String,
    pub frame: DataFrame,
}

impl NamedTable {
    pub fn new(name: impl Into<String>, frame: DataFrame) -> Self {
        Self {
            name: name.into(),
            frame,
        }
    }
}

/// Read access to named tables
pub trait TableSource {
    /// Load `columns` of `table`, in the order given.
    ///
    /// Column names match case-insensitively, as warehouse identifiers
    /// usually do; the returned frame uses the names as requested.
    fn load_table(&self, table: &str, columns: &[&str]) -> Result<DataFrame>;
}

/// Write access to named tables
pub trait TableSink {
    /// Create or fully replace every table in `tables`
    fn overwrite_tables(&mut self, tables: &[NamedTable]) -> Result<()>;
}

/// Anything that is both a source and a sink
pub trait Warehouse: TableSource + TableSink {}

impl<T: TableSource + TableSink + ?Sized> Warehouse for T {}

/// Check a table or column name is safe to embed as a quoted identifier.
///
/// Letters, digits, `_`, `$` and `.` are accepted; the name must not start
/// with a digit.
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'));
    if valid_start && valid_rest {
        Ok(())
    } else {
        Err(ForecastError::InvalidParameter(format!(
            "'{name}' is not a valid table or column name"
        )))
    }
}

/// Find `wanted` among `available`, exact match first, then ignoring case
pub(crate) fn resolve_column<'a>(available: &[&'a str], wanted: &str) -> Option<&'a str> {
    available
        .iter()
        .find(|c| **c == wanted)
        .or_else(|| available.iter().find(|c| c.eq_ignore_ascii_case(wanted)))
        .copied()
}

/// Select `columns` from a frame and give them the requested names
pub(crate) fn project(df: &DataFrame, table: &str, columns: &[&str]) -> Result<DataFrame> {
    let available = df.get_column_names();
    let mut selected = Vec::with_capacity(columns.len());
    for wanted in columns {
        let actual = resolve_column(&available, wanted).ok_or_else(|| {
            ForecastError::DataAccess(format!(
                "Table '{table}' has no column '{wanted}'; available columns: {}",
                available.join(", ")
            ))
        })?;
        let mut series = df.column(actual)?.clone();
        series.rename(wanted);
        selected.push(series);
    }
    Ok(DataFrame::new(selected)?)
}
