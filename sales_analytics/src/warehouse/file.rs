//! Directory of CSV or Parquet files, one per table

use super::{project, validate_identifier, NamedTable, TableSink, TableSource};
use crate::error::{ForecastError, Result};
use log::debug;
use polars::prelude::*;
use serde::Deserialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// On-disk encoding of each table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Parquet,
}

impl FileFormat {
    fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Parquet => "parquet",
        }
    }
}

/// Tables stored as `<root>/<table>.<ext>`.
///
/// A write batch first writes every table to a temporary file and only then
/// renames them into place. Each rename is atomic, but a failure between two
/// renames leaves the earlier tables replaced and the later ones untouched.
#[derive(Debug, Clone)]
pub struct FileWarehouse {
    root: PathBuf,
    format: FileFormat,
}

impl FileWarehouse {
    /// Use `root` as the table directory, creating it if needed
    pub fn open<P: AsRef<Path>>(root: P, format: FileFormat) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root, format })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// Location of the file backing `table`
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", table, self.format.extension()))
    }

    fn read(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)?;
        let df = match self.format {
            FileFormat::Csv => CsvReader::new(file)
                .has_header(true)
                .infer_schema(Some(1000))
                .finish()?,
            FileFormat::Parquet => ParquetReader::new(file).finish()?,
        };
        Ok(df)
    }

    fn write(&self, path: &Path, frame: &DataFrame) -> Result<()> {
        let mut file = File::create(path)?;
        let mut frame = frame.clone();
        match self.format {
            FileFormat::Csv => {
                CsvWriter::new(&mut file)
                    .has_header(true)
                    .finish(&mut frame)?;
            }
            FileFormat::Parquet => {
                ParquetWriter::new(&mut file).finish(&mut frame)?;
            }
        }
        file.sync_all()?;
        Ok(())
    }
}

impl TableSource for FileWarehouse {
    fn load_table(&self, table: &str, columns: &[&str]) -> Result<DataFrame> {
        validate_identifier(table)?;
        let path = self.table_path(table);
        if !path.exists() {
            return Err(ForecastError::DataAccess(format!(
                "Table '{}' not found at {}",
                table,
                path.display()
            )));
        }
        let df = self.read(&path).map_err(|e| {
            ForecastError::DataAccess(format!("Cannot read table '{table}': {e}"))
        })?;
        project(&df, table, columns)
    }
}

impl TableSink for FileWarehouse {
    fn overwrite_tables(&mut self, tables: &[NamedTable]) -> Result<()> {
        for table in tables {
            validate_identifier(&table.name)?;
        }

        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(tables.len());
        for table in tables {
            let target = self.table_path(&table.name);
            let temp = target.with_extension(format!("{}.tmp", self.format.extension()));
            if let Err(e) = self.write(&temp, &table.frame) {
                let _ = fs::remove_file(&temp);
                for (temp, _) in &staged {
                    let _ = fs::remove_file(temp);
                }
                return Err(ForecastError::Persistence(format!(
                    "Cannot write table '{}': {}",
                    table.name, e
                )));
            }
            staged.push((temp, target));
        }

        for (temp, target) in staged {
            debug!("Replacing {}", target.display());
            fs::rename(&temp, &target).map_err(|e| {
                ForecastError::Persistence(format!(
                    "Cannot move {} into place: {}",
                    target.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}
