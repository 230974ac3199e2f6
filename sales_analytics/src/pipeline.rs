//! Daily income forecast pipeline
//!
//! The run is split into a pure part, [`ForecastPipeline::run_pure`], which
//! turns raw purchase rows into a historical series and a forecast, and the
//! surrounding load and persist steps that talk to a warehouse. Both output
//! tables are handed to the sink in a single call, after everything else has
//! succeeded, so a failed run writes nothing.

use crate::data::{HistoricalSeries, IncomeRecords, DATE_COLUMN, FORECAST_COLUMN};
use crate::error::{ForecastError, PipelineStage, Result, StageContext};
use crate::models::holt_winters::{ModelSummary, SeasonalHoltWinters};
use crate::models::{ForecastModel, TrainedForecastModel};
use crate::utils::{date_series, future_dates};
use crate::warehouse::{validate_identifier, NamedTable, TableSink, TableSource};
use chrono::NaiveDate;
use log::{debug, info, warn};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Days per seasonal cycle
pub const SEASONAL_PERIOD: usize = 7;

/// Days forecast past the last observed date
pub const FORECAST_HORIZON: usize = 14;

/// Table and column names plus interval coverage for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Table holding one row per purchase
    pub source_table: String,
    /// Purchase timestamp column of the source table
    pub date_column: String,
    /// Total price column of the source table
    pub price_column: String,
    /// Output table for the daily mean income
    pub historical_table: String,
    /// Output table for the forecast
    pub forecast_table: String,
    /// Coverage of the prediction intervals
    pub confidence_level: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_table: "RAW_DATA".to_string(),
            date_column: "PURCHASE_DATE".to_string(),
            price_column: "TOTAL_PRICE".to_string(),
            historical_table: "HISTORICAL_AVG_INCOME".to_string(),
            forecast_table: "FORECASTED_INCOME".to_string(),
            confidence_level: 0.95,
        }
    }
}

impl PipelineConfig {
    /// Check every name is a usable identifier
    pub fn validate(&self) -> Result<()> {
        for name in [
            &self.source_table,
            &self.date_column,
            &self.price_column,
            &self.historical_table,
            &self.forecast_table,
        ] {
            validate_identifier(name)?;
        }
        if self.historical_table == self.forecast_table {
            return Err(ForecastError::InvalidParameter(format!(
                "Historical and forecast tables must differ, both are '{}'",
                self.historical_table
            )));
        }
        Ok(())
    }
}

/// Forecast values for consecutive days
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastTable {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
    intervals: Option<Vec<(f64, f64)>>,
    confidence_level: Option<f64>,
}

impl ForecastTable {
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "Forecast has {} dates but {} values",
                dates.len(),
                values.len()
            )));
        }
        Ok(Self {
            dates,
            values,
            intervals: None,
            confidence_level: None,
        })
    }

    /// Attach prediction intervals computed at `confidence_level`
    pub fn with_intervals(mut self, intervals: Vec<(f64, f64)>, confidence_level: f64) -> Result<Self> {
        if intervals.len() != self.values.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "Forecast has {} values but {} intervals",
                self.values.len(),
                intervals.len()
            )));
        }
        self.intervals = Some(intervals);
        self.confidence_level = Some(confidence_level);
        Ok(self)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Lower and upper bound per day, if intervals were computed
    pub fn intervals(&self) -> Option<&[(f64, f64)]> {
        self.intervals.as_deref()
    }

    pub fn confidence_level(&self) -> Option<f64> {
        self.confidence_level
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Frame with `date` (Date) and `forecasted_income` (Float64) columns.
    ///
    /// Intervals are not part of the stored table.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            date_series(DATE_COLUMN, &self.dates)?,
            Series::new(FORECAST_COLUMN, self.values.clone()),
        ])?)
    }
}

/// Everything a successful run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub historical: HistoricalSeries,
    pub forecast: ForecastTable,
    pub summary: ModelSummary,
    /// Raw rows dropped because their date did not parse
    pub unparsed_dates: usize,
}

/// Result of a pipeline run
#[derive(Debug, Clone)]
pub enum ForecastOutcome {
    /// No row had a usable date; nothing was fitted or written
    NoData,
    Forecast(PipelineOutput),
}

impl ForecastOutcome {
    pub fn is_empty(&self) -> bool {
        matches!(self, ForecastOutcome::NoData)
    }

    pub fn output(&self) -> Option<&PipelineOutput> {
        match self {
            ForecastOutcome::NoData => None,
            ForecastOutcome::Forecast(output) => Some(output),
        }
    }

    /// The forecast dataset; empty, with the same schema, for [`ForecastOutcome::NoData`]
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        match self {
            ForecastOutcome::NoData => Ok(DataFrame::new(vec![
                Series::new_empty(DATE_COLUMN, &DataType::Date),
                Series::new_empty(FORECAST_COLUMN, &DataType::Float64),
            ])?),
            ForecastOutcome::Forecast(output) => output.forecast.to_dataframe(),
        }
    }
}

/// Aggregates purchases, fits the weekly model and forecasts two weeks ahead
#[derive(Debug, Clone)]
pub struct ForecastPipeline {
    config: PipelineConfig,
    model: SeasonalHoltWinters,
}

impl ForecastPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let model = SeasonalHoltWinters::new(SEASONAL_PERIOD, config.confidence_level)?;
        Ok(Self { config, model })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Transform raw purchase rows without touching any warehouse.
    ///
    /// `raw` must hold the configured date and price columns.
    pub fn run_pure(&self, raw: &DataFrame) -> Result<ForecastOutcome> {
        let records =
            IncomeRecords::from_dataframe(raw, &self.config.date_column, &self.config.price_column)
                .in_stage(PipelineStage::Aggregate)?;

        let unparsed_dates = records.unparsed_dates();
        if unparsed_dates > 0 {
            warn!(
                "{} of {} records have an unparsable {} and were skipped",
                unparsed_dates,
                records.len(),
                self.config.date_column
            );
        }

        let historical = records.daily_mean();
        let last_date = match historical.last_date() {
            Some(date) => date,
            None => {
                info!("No dated records found, skipping forecast");
                return Ok(ForecastOutcome::NoData);
            }
        };
        info!(
            "Aggregated {} records into {} daily means ({} to {})",
            records.len(),
            historical.len(),
            historical.first_date().unwrap_or(last_date),
            last_date
        );
        if historical.missing_days() > 0 {
            debug!("{} calendar days have no sales", historical.missing_days());
        }

        let trained = self
            .model
            .train(&historical)
            .in_stage(PipelineStage::Fit)?;
        let summary = trained.summary();
        log_summary(trained.name(), &summary);

        let result = trained
            .forecast(FORECAST_HORIZON)
            .in_stage(PipelineStage::Forecast)?;
        let dates = future_dates(last_date, FORECAST_HORIZON).in_stage(PipelineStage::Forecast)?;
        let mut forecast =
            ForecastTable::new(dates, result.values().to_vec()).in_stage(PipelineStage::Forecast)?;
        if let (Some(intervals), Some(level)) = (result.intervals(), result.confidence_level()) {
            forecast = forecast
                .with_intervals(intervals.to_vec(), level)
                .in_stage(PipelineStage::Forecast)?;
        }

        Ok(ForecastOutcome::Forecast(PipelineOutput {
            historical,
            forecast,
            summary,
            unparsed_dates,
        }))
    }

    /// Load, transform and persist in one run
    pub fn run<W>(&self, warehouse: &mut W) -> Result<ForecastOutcome>
    where
        W: TableSource + TableSink + ?Sized,
    {
        let raw = warehouse
            .load_table(
                &self.config.source_table,
                &[
                    self.config.date_column.as_str(),
                    self.config.price_column.as_str(),
                ],
            )
            .in_stage(PipelineStage::Load)?;
        info!(
            "Loaded {} rows from {}",
            raw.height(),
            self.config.source_table
        );

        let outcome = self.run_pure(&raw)?;
        let output = match &outcome {
            ForecastOutcome::NoData => return Ok(outcome),
            ForecastOutcome::Forecast(output) => output,
        };

        let tables = [
            NamedTable::new(
                self.config.historical_table.as_str(),
                output
                    .historical
                    .to_dataframe()
                    .in_stage(PipelineStage::Persist)?,
            ),
            NamedTable::new(
                self.config.forecast_table.as_str(),
                output
                    .forecast
                    .to_dataframe()
                    .in_stage(PipelineStage::Persist)?,
            ),
        ];
        warehouse
            .overwrite_tables(&tables)
            .in_stage(PipelineStage::Persist)?;
        info!(
            "Wrote {} historical rows to {} and {} forecast rows to {}",
            output.historical.len(),
            self.config.historical_table,
            output.forecast.len(),
            self.config.forecast_table
        );

        Ok(outcome)
    }
}

fn log_summary(name: &str, summary: &ModelSummary) {
    info!(
        "Fitted {}: alpha={:.4} beta={:.4} gamma={:.4} level={:.2} trend={:.4} sse={:.4}{}",
        name,
        summary.params.alpha,
        summary.params.beta,
        summary.params.gamma,
        summary.level,
        summary.trend,
        summary.sse,
        if summary.converged { "" } else { " (optimizer did not converge)" }
    );
    if let Some(accuracy) = &summary.accuracy {
        info!("In-sample accuracy: {}", accuracy);
    }
}

/// Forecast daily total income from the raw purchase table and store the
/// historical and forecast tables
pub fn forecast_total_income<W>(warehouse: &mut W, config: &PipelineConfig) -> Result<ForecastOutcome>
where
    W: TableSource + TableSink + ?Sized,
{
    ForecastPipeline::new(config.clone())?.run(warehouse)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(dates: &[&str], prices: &[Option<f64>]) -> DataFrame {
        DataFrame::new(vec![
            Series::new("PURCHASE_DATE", dates),
            Series::new("TOTAL_PRICE", prices),
        ])
        .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.source_table, "RAW_DATA");
        assert_eq!(config.forecast_table, "FORECASTED_INCOME");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_bad_names() {
        let config = PipelineConfig {
            source_table: "RAW DATA".to_string(),
            ..PipelineConfig::default()
        };
        assert!(ForecastPipeline::new(config).is_err());

        let config = PipelineConfig {
            forecast_table: "HISTORICAL_AVG_INCOME".to_string(),
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_all_dates_unparsable_is_no_data() {
        let pipeline = ForecastPipeline::new(PipelineConfig::default()).unwrap();
        let outcome = pipeline
            .run_pure(&raw(&["nope", "still not"], &[Some(1.0), Some(2.0)]))
            .unwrap();
        assert!(outcome.is_empty());

        let df = outcome.to_dataframe().unwrap();
        assert_eq!(df.height(), 0);
        assert_eq!(df.get_column_names(), vec![DATE_COLUMN, FORECAST_COLUMN]);
    }

    #[test]
    fn test_short_history_fails_in_fit_stage() {
        let pipeline = ForecastPipeline::new(PipelineConfig::default()).unwrap();
        let err = pipeline
            .run_pure(&raw(
                &["2024-01-01", "2024-01-01", "2024-01-02"],
                &[Some(100.0), Some(200.0), Some(150.0)],
            ))
            .unwrap_err();
        assert_eq!(err.stage(), Some(PipelineStage::Fit));
        assert!(matches!(err.root(), ForecastError::ModelFit(_)));
    }

    #[test]
    fn test_forecast_table_length_mismatch() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(ForecastTable::new(vec![date], vec![]).is_err());
        let table = ForecastTable::new(vec![date], vec![1.0]).unwrap();
        assert!(table.with_intervals(vec![], 0.95).is_err());
    }
}
