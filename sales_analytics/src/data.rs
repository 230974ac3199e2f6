//! Purchase records and the daily income series derived from them

use crate::error::{ForecastError, Result};
use crate::utils::{date_column, date_series, float_column};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::BTreeMap;

/// Canonical name of the date column in both output tables
pub const DATE_COLUMN: &str = "date";
/// Canonical name of the daily mean income column
pub const INCOME_COLUMN: &str = "total_income";
/// Canonical name of the forecast value column
pub const FORECAST_COLUMN: &str = "forecasted_income";

/// Purchase records projected to a date and an income per row
#[derive(Debug, Clone, Default)]
pub struct IncomeRecords {
    /// Calendar date of each purchase; `None` when the raw value did not parse
    dates: Vec<Option<NaiveDate>>,
    /// Total price of each purchase, with missing prices already zeroed
    incomes: Vec<f64>,
}

impl IncomeRecords {
    /// Build records from parsed dates and raw prices.
    ///
    /// Missing prices are replaced with zero.
    pub fn new(dates: Vec<Option<NaiveDate>>, prices: Vec<Option<f64>>) -> Result<Self> {
        if dates.len() != prices.len() {
            return Err(ForecastError::DataAccess(format!(
                "Date column has {} rows but price column has {}",
                dates.len(),
                prices.len()
            )));
        }
        Ok(Self {
            dates,
            incomes: prices.into_iter().map(|p| p.unwrap_or(0.0)).collect(),
        })
    }

    /// Read records from a raw frame holding the two named columns
    pub fn from_dataframe(df: &DataFrame, date_col: &str, price_col: &str) -> Result<Self> {
        let dates = date_column(column(df, date_col)?)?;
        let prices = float_column(column(df, price_col)?)?;
        Self::new(dates, prices)
    }

    /// Number of records, including those without a usable date
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Records whose date could not be parsed
    pub fn unparsed_dates(&self) -> usize {
        self.dates.iter().filter(|d| d.is_none()).count()
    }

    pub fn dates(&self) -> &[Option<NaiveDate>] {
        &self.dates
    }

    pub fn incomes(&self) -> &[f64] {
        &self.incomes
    }

    /// Mean income per calendar date, ascending by date.
    ///
    /// Records without a date have no group and are left out.
    pub fn daily_mean(&self) -> HistoricalSeries {
        let mut groups: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
        for (date, income) in self.dates.iter().zip(&self.incomes) {
            if let Some(date) = date {
                let entry = groups.entry(*date).or_insert((0.0, 0));
                entry.0 += income;
                entry.1 += 1;
            }
        }

        let (dates, values) = groups
            .into_iter()
            .map(|(date, (sum, count))| (date, sum / count as f64))
            .unzip();
        HistoricalSeries { dates, values }
    }
}

/// Daily mean income, one row per distinct date, strictly ascending
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoricalSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl HistoricalSeries {
    /// Create a series, checking dates are strictly increasing
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "Dates length ({}) doesn't match values length ({})",
                dates.len(),
                values.len()
            )));
        }
        if let Some(pair) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(ForecastError::InvalidParameter(format!(
                "Dates must be strictly increasing: {} is followed by {}",
                pair[0], pair[1]
            )));
        }
        Ok(Self { dates, values })
    }

    /// Read a historical table with `date` and `total_income` columns
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let dates = date_column(column(df, DATE_COLUMN)?)?;
        let values = float_column(column(df, INCOME_COLUMN)?)?;
        let dates = dates
            .into_iter()
            .enumerate()
            .map(|(i, d)| {
                d.ok_or_else(|| {
                    ForecastError::DataAccess(format!("Historical row {i} has no valid date"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(dates, values.into_iter().map(|v| v.unwrap_or(0.0)).collect())
    }

    /// Frame with `date` (Date) and `total_income` (Float64) columns
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            date_series(DATE_COLUMN, &self.dates)?,
            Series::new(INCOME_COLUMN, self.values.clone()),
        ])?)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Value recorded for `date`, if present
    pub fn value_on(&self, date: NaiveDate) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|idx| self.values[idx])
    }

    /// Calendar days between the first and last date that have no row
    pub fn missing_days(&self) -> usize {
        match (self.first_date(), self.last_date()) {
            (Some(first), Some(last)) => {
                let span = (last - first).num_days() as usize + 1;
                span - self.len()
            }
            _ => 0,
        }
    }
}

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name).map_err(|_| {
        ForecastError::DataAccess(format!(
            "Column '{}' not found; available columns: {}",
            name,
            df.get_column_names().join(", ")
        ))
    })
}
