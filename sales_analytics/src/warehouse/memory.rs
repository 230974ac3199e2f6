//! In-memory warehouse

use super::{project, NamedTable, TableSink, TableSource};
use crate::error::{ForecastError, Result};
use polars::prelude::*;
use std::collections::HashMap;

/// Tables held as data frames in a map
#[derive(Debug, Clone, Default)]
pub struct MemoryWarehouse {
    tables: HashMap<String, DataFrame>,
    writes: usize,
    rejected_table: Option<String>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a table directly, bypassing the write counter
    pub fn insert(&mut self, name: impl Into<String>, frame: DataFrame) {
        self.tables.insert(name.into(), frame);
    }

    /// Builder form of [`MemoryWarehouse::insert`]
    pub fn with_table(mut self, name: impl Into<String>, frame: DataFrame) -> Self {
        self.insert(name, frame);
        self
    }

    /// Make every write batch that includes `name` fail
    pub fn reject_writes_to(mut self, name: impl Into<String>) -> Self {
        self.rejected_table = Some(name.into());
        self
    }

    pub fn table(&self, name: &str) -> Option<&DataFrame> {
        self.tables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Number of successful `overwrite_tables` calls
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl TableSource for MemoryWarehouse {
    fn load_table(&self, table: &str, columns: &[&str]) -> Result<DataFrame> {
        let frame = self
            .tables
            .get(table)
            .ok_or_else(|| ForecastError::DataAccess(format!("Table '{table}' does not exist")))?;
        project(frame, table, columns)
    }
}

impl TableSink for MemoryWarehouse {
    fn overwrite_tables(&mut self, tables: &[NamedTable]) -> Result<()> {
        // all-or-nothing: check the whole batch before touching the map
        if let Some(rejected) = &self.rejected_table {
            if tables.iter().any(|t| &t.name == rejected) {
                return Err(ForecastError::Persistence(format!(
                    "Writes to table '{rejected}' are rejected"
                )));
            }
        }
        for table in tables {
            self.tables.insert(table.name.clone(), table.frame.clone());
        }
        self.writes += 1;
        Ok(())
    }
}
