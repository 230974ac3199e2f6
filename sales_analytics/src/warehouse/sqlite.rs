//! SQLite-backed warehouse
//!
//! Identifiers cannot be bound as parameters, so table and column names are
//! validated and double-quoted; every value travels as a bound parameter.

use super::{resolve_column, validate_identifier, NamedTable, TableSink, TableSource};
use crate::error::{ForecastError, Result};
use crate::utils::{date_column, float_column, text_column};
use log::debug;
use polars::prelude::*;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use std::path::Path;

/// Tables stored in a SQLite database
#[derive(Debug)]
pub struct SqliteWarehouse {
    conn: Connection,
}

impl SqliteWarehouse {
    /// Open (or create) a database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    /// A private in-memory database
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Underlying connection, for seeding or inspecting tables
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Whether `table` exists, ignoring case as SQLite does
    pub fn has_table(&self, table: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
                [table],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Number of rows in `table`
    pub fn row_count(&self, table: &str) -> Result<usize> {
        validate_identifier(table)?;
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", quote(table)), [], |row| {
                    row.get(0)
                })?;
        Ok(count as usize)
    }

    /// Column names with their declared types
    fn table_columns(&self, table: &str) -> Result<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote(table)))?;
        let columns = stmt
            .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    fn query_columns(&self, table: &str, columns: &[&str]) -> Result<DataFrame> {
        if !self.has_table(table)? {
            return Err(ForecastError::DataAccess(format!(
                "Table '{table}' does not exist"
            )));
        }

        let declared = self.table_columns(table)?;
        let existing: Vec<&str> = declared.iter().map(|(name, _)| name.as_str()).collect();
        let mut selected = Vec::with_capacity(columns.len());
        let mut text_affinity = Vec::with_capacity(columns.len());
        for wanted in columns {
            validate_identifier(wanted)?;
            let actual = resolve_column(&existing, wanted).ok_or_else(|| {
                ForecastError::DataAccess(format!(
                    "Table '{table}' has no column '{wanted}'; available columns: {}",
                    existing.join(", ")
                ))
            })?;
            selected.push(quote(actual));
            text_affinity.push(
                declared
                    .iter()
                    .any(|(name, decl)| name == actual && has_text_affinity(decl)),
            );
        }

        let sql = format!("SELECT {} FROM {}", selected.join(", "), quote(table));
        debug!("{sql}");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;

        let mut values: Vec<Vec<Value>> = vec![Vec::new(); columns.len()];
        while let Some(row) = rows.next()? {
            for (i, column) in values.iter_mut().enumerate() {
                column.push(row.get::<_, Value>(i)?);
            }
        }

        let series = columns
            .iter()
            .zip(values)
            .zip(text_affinity)
            .map(|((name, column), text)| series_from_values(name, column, text))
            .collect::<Result<Vec<_>>>()?;
        Ok(DataFrame::new(series)?)
    }

    fn replace_all(&mut self, tables: &[NamedTable]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for table in tables {
            let columns = table
                .frame
                .get_columns()
                .iter()
                .map(SqlColumn::from_series)
                .collect::<Result<Vec<_>>>()?;

            let definitions: Vec<String> = columns
                .iter()
                .map(|c| format!("{} {}", quote(&c.name), c.sql_type))
                .collect();
            tx.execute(&format!("DROP TABLE IF EXISTS {}", quote(&table.name)), [])?;
            tx.execute(
                &format!(
                    "CREATE TABLE {} ({})",
                    quote(&table.name),
                    definitions.join(", ")
                ),
                [],
            )?;

            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
            let insert = format!(
                "INSERT INTO {} VALUES ({})",
                quote(&table.name),
                placeholders.join(", ")
            );
            let mut stmt = tx.prepare(&insert)?;
            for row in 0..table.frame.height() {
                stmt.execute(params_from_iter(columns.iter().map(|c| &c.values[row])))?;
            }
            debug!(
                "Wrote {} rows to {}",
                table.frame.height(),
                table.name
            );
        }
        tx.commit()?;
        Ok(())
    }
}

impl TableSource for SqliteWarehouse {
    fn load_table(&self, table: &str, columns: &[&str]) -> Result<DataFrame> {
        validate_identifier(table)?;
        self.query_columns(table, columns).map_err(|e| match e {
            kept @ (ForecastError::DataAccess(_) | ForecastError::InvalidParameter(_)) => kept,
            other => ForecastError::DataAccess(format!("Cannot read table '{table}': {other}")),
        })
    }
}

impl TableSink for SqliteWarehouse {
    fn overwrite_tables(&mut self, tables: &[NamedTable]) -> Result<()> {
        for table in tables {
            validate_identifier(&table.name)?;
            for name in table.frame.get_column_names() {
                validate_identifier(name)?;
            }
        }
        // the transaction rolls back when dropped uncommitted
        self.replace_all(tables)
            .map_err(|e| ForecastError::Persistence(e.to_string()))
    }
}

/// A frame column converted to SQLite values
struct SqlColumn {
    name: String,
    sql_type: &'static str,
    values: Vec<Value>,
}

impl SqlColumn {
    fn from_series(series: &Series) -> Result<Self> {
        let name = series.name().to_string();
        let column = match series.dtype() {
            DataType::Date | DataType::Datetime(_, _) => Self {
                name,
                sql_type: "TEXT",
                values: date_column(series)?
                    .into_iter()
                    .map(|d| d.map_or(Value::Null, |d| Value::Text(d.format("%Y-%m-%d").to_string())))
                    .collect(),
            },
            DataType::Float32 | DataType::Float64 => Self {
                name,
                sql_type: "REAL",
                values: float_column(series)?
                    .into_iter()
                    .map(|v| v.map_or(Value::Null, Value::Real))
                    .collect(),
            },
            // floats are matched above, so what remains numeric is integral
            dtype if dtype.is_numeric() => Self {
                name,
                sql_type: "INTEGER",
                values: series
                    .cast(&DataType::Int64)?
                    .i64()?
                    .into_iter()
                    .map(|v| v.map_or(Value::Null, Value::Integer))
                    .collect(),
            },
            DataType::Utf8 => Self {
                name,
                sql_type: "TEXT",
                values: text_column(series)?
                    .into_iter()
                    .map(|v| v.map_or(Value::Null, Value::Text))
                    .collect(),
            },
            other => {
                return Err(ForecastError::Persistence(format!(
                    "Column '{}' has type {} which cannot be stored",
                    series.name(),
                    other
                )))
            }
        };
        Ok(column)
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Whether a declared column type stores text, following SQLite's affinity
/// rules, with date and time types counted as text as well
fn has_text_affinity(declared: &str) -> bool {
    let declared = declared.to_ascii_uppercase();
    ["CHAR", "CLOB", "TEXT", "DATE", "TIME"]
        .iter()
        .any(|marker| declared.contains(marker))
}

/// Numeric columns become Float64; a text column, or any text value, makes
/// the column Utf8
fn series_from_values(name: &str, values: Vec<Value>, text_column: bool) -> Result<Series> {
    if values.iter().any(|v| matches!(v, Value::Blob(_))) {
        return Err(ForecastError::DataAccess(format!(
            "Column '{name}' holds binary data"
        )));
    }

    if text_column || values.iter().any(|v| matches!(v, Value::Text(_))) {
        let text: Vec<Option<String>> = values
            .into_iter()
            .map(|v| match v {
                Value::Text(s) => Some(s),
                Value::Integer(i) => Some(i.to_string()),
                Value::Real(f) => Some(f.to_string()),
                _ => None,
            })
            .collect();
        return Ok(Series::new(name, text));
    }

    let numbers: Vec<Option<f64>> = values
        .into_iter()
        .map(|v| match v {
            Value::Integer(i) => Some(i as f64),
            Value::Real(f) => Some(f),
            _ => None,
        })
        .collect();
    Ok(Series::new(name, numbers))
}
