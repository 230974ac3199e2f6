//! Utility functions for the sales_analytics crate

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime};
use polars::prelude::*;

/// Days from 0001-01-01 (CE day 1) to 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Date-time layouts tried after plain dates, most specific first
const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

/// Date layouts; month-first slashes win over day-first
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y"];

/// Parse a purchase timestamp into its calendar date.
///
/// Returns `None` for anything that matches no known layout; callers treat
/// that as a missing date rather than an error.
pub fn parse_date_lenient(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.date());
        }
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Convert days since 1970-01-01 to a date
pub fn date_from_epoch_days(days: i32) -> Option<NaiveDate> {
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
}

/// Convert a date to days since 1970-01-01
pub fn epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Build a polars `Date` series from calendar dates
pub fn date_series(name: &str, dates: &[NaiveDate]) -> Result<Series> {
    let days: Vec<i32> = dates.iter().map(|d| epoch_days(*d)).collect();
    Ok(Series::new(name, days).cast(&DataType::Date)?)
}

/// Read a column of dates, parsing text leniently.
///
/// Text values that fail to parse become `None`. Native `Date` and
/// `Datetime` columns are truncated to the calendar date. Numbers carry no
/// calendar layout, so numeric columns read as all `None`, as does a column
/// holding nothing but nulls whatever its type.
pub fn date_column(series: &Series) -> Result<Vec<Option<NaiveDate>>> {
    if series.null_count() == series.len() {
        return Ok(vec![None; series.len()]);
    }
    let days = match series.dtype() {
        DataType::Utf8 => {
            return Ok(series
                .utf8()?
                .into_iter()
                .map(|v| v.and_then(parse_date_lenient))
                .collect())
        }
        DataType::Date => series.cast(&DataType::Int32)?,
        DataType::Datetime(_, _) => series.cast(&DataType::Date)?.cast(&DataType::Int32)?,
        dtype if dtype.is_numeric() => return Ok(vec![None; series.len()]),
        other => {
            return Err(ForecastError::DataAccess(format!(
                "Column '{}' has type {} which cannot hold dates",
                series.name(),
                other
            )))
        }
    };
    Ok(days
        .i32()?
        .into_iter()
        .map(|d| d.and_then(date_from_epoch_days))
        .collect())
}

/// Read a numeric column as `f64`, keeping nulls.
///
/// Text columns are cast, so values that are not numbers become `None`.
pub fn float_column(series: &Series) -> Result<Vec<Option<f64>>> {
    let dtype = series.dtype();
    if !(dtype.is_numeric() || matches!(dtype, DataType::Utf8)) {
        return Err(ForecastError::DataAccess(format!(
            "Column '{}' has type {} which is not numeric",
            series.name(),
            dtype
        )));
    }
    let values = series.cast(&DataType::Float64)?;
    Ok(values
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// Read a text column, rendering other types with their display form
pub fn text_column(series: &Series) -> Result<Vec<Option<String>>> {
    let text = series.cast(&DataType::Utf8)?;
    Ok(text
        .utf8()?
        .into_iter()
        .map(|v| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
        .collect())
}

/// The `horizon` consecutive calendar days following `last`
pub fn future_dates(last: NaiveDate, horizon: usize) -> Result<Vec<NaiveDate>> {
    (1..=horizon as u64)
        .map(|h| {
            last.checked_add_days(Days::new(h)).ok_or_else(|| {
                ForecastError::InvalidParameter(format!(
                    "Forecast horizon of {horizon} days from {last} exceeds the supported date range"
                ))
            })
        })
        .collect()
}
