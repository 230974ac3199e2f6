//! # Sales Analytics
//!
//! Daily income forecasting and dashboard queries over a table of purchases.
//!
//! ## Features
//!
//! - Lenient loading of purchase dates and prices from any table source
//! - Daily mean income aggregation
//! - Additive Holt-Winters forecast with a weekly season and prediction intervals
//! - SQLite, CSV/Parquet directory and in-memory warehouses
//! - Filtered summary, product, location, payment and device breakdowns
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sales_analytics::pipeline::{forecast_total_income, PipelineConfig};
//! use sales_analytics::warehouse::SqliteWarehouse;
//!
//! let mut warehouse = SqliteWarehouse::open("sales.db")?;
//! let outcome = forecast_total_income(&mut warehouse, &PipelineConfig::default())?;
//! if let Some(output) = outcome.output() {
//!     for (date, value) in output.forecast.dates().iter().zip(output.forecast.values()) {
//!         println!("{date}: {value:.2}");
//!     }
//! }
//! # Ok::<(), sales_analytics::ForecastError>(())
//! ```

pub mod config;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod utils;
pub mod warehouse;

// Re-export commonly used types
pub use crate::config::Settings;
pub use crate::dashboard::{SalesFilter, SalesFrame};
pub use crate::data::{HistoricalSeries, IncomeRecords};
pub use crate::error::{ForecastError, PipelineStage};
pub use crate::models::{ForecastModel, ForecastResult};
pub use crate::pipeline::{
    forecast_total_income, ForecastOutcome, ForecastPipeline, PipelineConfig,
};
pub use crate::warehouse::{TableSink, TableSource, Warehouse};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
