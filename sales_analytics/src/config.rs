//! Settings for the forecast binary and embedders
//!
//! Values come from an optional `forecast.{yaml,toml,json}` file, overridden by
//! `SALES_`-prefixed environment variables with `__` between nesting levels,
//! e.g. `SALES_WAREHOUSE__KIND=csv` or `SALES_PIPELINE__SOURCE_TABLE=ORDERS`.

use crate::dashboard::{SalesColumns, SalesFrame};
use crate::error::{ForecastError, Result};
use crate::pipeline::PipelineConfig;
use crate::warehouse::{FileFormat, FileWarehouse, SqliteWarehouse, TableSource, Warehouse};
use config::{Config, Environment, File};
use log::LevelFilter;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Prefix of environment variables read by [`Settings::new`]
pub const ENV_PREFIX: &str = "SALES";

/// Base name of the optional settings file
pub const SETTINGS_FILE: &str = "forecast";

/// Storage backend holding the sales and output tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarehouseKind {
    Sqlite,
    Csv,
    Parquet,
}

/// Where the tables live
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WarehouseSettings {
    #[serde(default = "default_warehouse_kind")]
    pub kind: WarehouseKind,
    /// Database file for SQLite, table directory for CSV and Parquet
    #[serde(default = "default_warehouse_path")]
    pub path: PathBuf,
}

fn default_warehouse_kind() -> WarehouseKind {
    WarehouseKind::Sqlite
}

fn default_warehouse_path() -> PathBuf {
    PathBuf::from("sales.db")
}

impl Default for WarehouseSettings {
    fn default() -> Self {
        Self {
            kind: default_warehouse_kind(),
            path: default_warehouse_path(),
        }
    }
}

impl WarehouseSettings {
    /// Open the configured backend
    pub fn open(&self) -> Result<Box<dyn Warehouse>> {
        let warehouse: Box<dyn Warehouse> = match self.kind {
            WarehouseKind::Sqlite => Box::new(SqliteWarehouse::open(&self.path)?),
            WarehouseKind::Csv => Box::new(FileWarehouse::open(&self.path, FileFormat::Csv)?),
            WarehouseKind::Parquet => {
                Box::new(FileWarehouse::open(&self.path, FileFormat::Parquet)?)
            }
        };
        Ok(warehouse)
    }
}

/// Top-level settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub warehouse: WarehouseSettings,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub sales_columns: SalesColumns,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            warehouse: WarehouseSettings::default(),
            pipeline: PipelineConfig::default(),
            sales_columns: SalesColumns::default(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Read `forecast.*` from the working directory, if present, and the environment
    pub fn new() -> Result<Self> {
        Self::load(None)
    }

    /// Read settings from `path` (required when given) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// Same as [`Settings::load`] with a custom environment variable prefix
    pub fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(SETTINGS_FILE).required(false),
        };
        let s = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = s.try_deserialize()?;
        settings.pipeline.validate()?;
        Ok(settings)
    }

    /// Parsed `log_level`
    pub fn level_filter(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(&self.log_level).map_err(|_| {
            ForecastError::Config(format!("Unknown log level '{}'", self.log_level))
        })
    }

    /// Open the configured warehouse
    pub fn open_warehouse(&self) -> Result<Box<dyn Warehouse>> {
        self.warehouse.open()
    }

    /// Dashboard view of the pipeline's source table under the configured column names
    pub fn sales_frame<S: TableSource + ?Sized>(&self, source: &S) -> Result<SalesFrame> {
        SalesFrame::load(source, &self.pipeline.source_table, &self.sales_columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.warehouse.kind, WarehouseKind::Sqlite);
        assert_eq!(settings.pipeline, PipelineConfig::default());
        assert_eq!(settings.level_filter().unwrap(), LevelFilter::Info);
    }

    #[test]
    fn test_unknown_log_level() {
        let settings = Settings {
            log_level: "chatty".to_string(),
            ..Settings::default()
        };
        assert!(matches!(settings.level_filter(), Err(ForecastError::Config(_))));
    }
}
