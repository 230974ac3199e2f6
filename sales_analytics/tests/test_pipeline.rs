use approx::assert_abs_diff_eq;
use chrono::{Days, NaiveDate};
use polars::prelude::*;
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sales_analytics::data::{HistoricalSeries, IncomeRecords, DATE_COLUMN, FORECAST_COLUMN};
use sales_analytics::pipeline::FORECAST_HORIZON;
use sales_analytics::utils::{date_column, float_column};
use sales_analytics::warehouse::MemoryWarehouse;
use sales_analytics::{
    forecast_total_income, ForecastError, ForecastOutcome, ForecastPipeline, PipelineConfig,
    PipelineStage,
};

const WEEKLY: [f64; 7] = [30.0, 10.0, 0.0, -5.0, -10.0, -20.0, -5.0];

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn day(offset: usize) -> NaiveDate {
    start().checked_add_days(Days::new(offset as u64)).unwrap()
}

fn daily_income(t: usize) -> f64 {
    500.0 + 2.0 * t as f64 + WEEKLY[t % 7]
}

// Two purchases a day, 10 below and 10 above the day's mean income
fn raw_sales(days: usize) -> (Vec<String>, Vec<Option<f64>>) {
    let mut dates = Vec::new();
    let mut prices = Vec::new();
    for t in 0..days {
        let income = daily_income(t);
        dates.push(format!("{} 09:30:00", day(t)));
        prices.push(Some(income - 10.0));
        dates.push(day(t).format("%Y-%m-%d").to_string());
        prices.push(Some(income + 10.0));
    }
    (dates, prices)
}

fn frame(dates: &[String], prices: &[Option<f64>]) -> DataFrame {
    DataFrame::new(vec![
        Series::new("PURCHASE_DATE", dates),
        Series::new("TOTAL_PRICE", prices),
        Series::new("LOCATION", vec!["Colombo"; dates.len()]),
    ])
    .unwrap()
}

fn warehouse(days: usize) -> MemoryWarehouse {
    let (dates, prices) = raw_sales(days);
    MemoryWarehouse::new().with_table("RAW_DATA", frame(&dates, &prices))
}

#[test]
fn test_example_daily_means() {
    let dates = vec![
        "2024-01-01".to_string(),
        "2024-01-01".to_string(),
        "2024-01-02".to_string(),
    ];
    let df = frame(&dates, &[Some(100.0), Some(200.0), Some(150.0)]);

    let historical = IncomeRecords::from_dataframe(&df, "PURCHASE_DATE", "TOTAL_PRICE")
        .unwrap()
        .daily_mean();
    assert_eq!(historical.dates(), &[day(0), day(1)]);
    assert_eq!(historical.values(), &[150.0, 150.0]);
}

#[test]
fn test_full_forecast_run() {
    let mut warehouse = warehouse(35);
    let outcome = forecast_total_income(&mut warehouse, &PipelineConfig::default()).unwrap();

    let output = outcome.output().expect("forecast expected");
    assert_eq!(output.historical.len(), 35);
    for (t, value) in output.historical.values().iter().enumerate() {
        assert_abs_diff_eq!(*value, daily_income(t), epsilon = 1e-9);
    }

    // 14 consecutive days right after the last observation
    let expected_dates: Vec<NaiveDate> = (35..35 + FORECAST_HORIZON).map(day).collect();
    assert_eq!(output.forecast.dates(), expected_dates.as_slice());

    // noiseless trend plus season is recovered
    for (i, value) in output.forecast.values().iter().enumerate() {
        assert_abs_diff_eq!(*value, daily_income(35 + i), epsilon = 1e-6);
    }
    assert_eq!(output.summary.seasonal.len(), 7);
    assert_eq!(output.unparsed_dates, 0);

    let intervals = output.forecast.intervals().unwrap();
    assert_eq!(intervals.len(), FORECAST_HORIZON);
    assert_eq!(output.forecast.confidence_level(), Some(0.95));

    // both tables stored in a single write
    assert_eq!(warehouse.writes(), 1);
    let stored = warehouse.table("HISTORICAL_AVG_INCOME").unwrap();
    assert_eq!(stored.get_column_names(), vec![DATE_COLUMN, "total_income"]);
    assert_eq!(stored.column(DATE_COLUMN).unwrap().dtype(), &DataType::Date);
    assert_eq!(HistoricalSeries::from_dataframe(stored).unwrap(), output.historical);

    let stored = warehouse.table("FORECASTED_INCOME").unwrap();
    assert_eq!(stored.get_column_names(), vec![DATE_COLUMN, FORECAST_COLUMN]);
    assert_eq!(stored.height(), FORECAST_HORIZON);
}

#[test]
fn test_unparsable_date_is_skipped() {
    let (mut dates, mut prices) = raw_sales(21);
    dates.push("not-a-date".to_string());
    prices.push(Some(1_000_000.0));

    let pipeline = ForecastPipeline::new(PipelineConfig::default()).unwrap();
    let outcome = pipeline.run_pure(&frame(&dates, &prices)).unwrap();

    let output = outcome.output().unwrap();
    assert_eq!(output.unparsed_dates, 1);
    assert_eq!(output.historical.len(), 21);
    assert!(output.historical.values().iter().all(|v| *v < 1_000.0));
}

#[test]
fn test_null_price_counts_as_zero() {
    let (mut dates, mut prices) = raw_sales(14);
    dates.push(day(0).to_string());
    prices.push(None);

    let pipeline = ForecastPipeline::new(PipelineConfig::default()).unwrap();
    let outcome = pipeline.run_pure(&frame(&dates, &prices)).unwrap();

    // three purchases on day 0 now: income - 10, income + 10 and 0
    let first = outcome.output().unwrap().historical.values()[0];
    assert_abs_diff_eq!(first, 2.0 * daily_income(0) / 3.0, epsilon = 1e-9);
}

#[test]
fn test_rerun_replaces_outputs_identically() {
    let mut warehouse = warehouse(28);
    let config = PipelineConfig::default();

    forecast_total_income(&mut warehouse, &config).unwrap();
    let first_hist = warehouse.table("HISTORICAL_AVG_INCOME").unwrap().clone();
    let first_fc = warehouse.table("FORECASTED_INCOME").unwrap().clone();

    forecast_total_income(&mut warehouse, &config).unwrap();
    let second_hist = warehouse.table("HISTORICAL_AVG_INCOME").unwrap();
    let second_fc = warehouse.table("FORECASTED_INCOME").unwrap();

    assert_eq!(warehouse.writes(), 2);
    assert_eq!(
        HistoricalSeries::from_dataframe(&first_hist).unwrap(),
        HistoricalSeries::from_dataframe(second_hist).unwrap()
    );
    assert_eq!(second_fc.height(), FORECAST_HORIZON);
    assert_eq!(
        date_column(first_fc.column(DATE_COLUMN).unwrap()).unwrap(),
        date_column(second_fc.column(DATE_COLUMN).unwrap()).unwrap()
    );
    assert_eq!(
        float_column(first_fc.column(FORECAST_COLUMN).unwrap()).unwrap(),
        float_column(second_fc.column(FORECAST_COLUMN).unwrap()).unwrap()
    );
}

#[test]
fn test_empty_source_writes_nothing() {
    let mut warehouse = MemoryWarehouse::new().with_table("RAW_DATA", frame(&[], &[]));

    let outcome = forecast_total_income(&mut warehouse, &PipelineConfig::default()).unwrap();
    assert!(matches!(outcome, ForecastOutcome::NoData));
    assert_eq!(outcome.to_dataframe().unwrap().height(), 0);
    assert_eq!(warehouse.writes(), 0);
    assert!(!warehouse.contains("HISTORICAL_AVG_INCOME"));
    assert!(!warehouse.contains("FORECASTED_INCOME"));
}

#[test]
fn test_thirteen_days_fail_to_fit() {
    let mut warehouse = warehouse(13);

    let err = forecast_total_income(&mut warehouse, &PipelineConfig::default()).unwrap_err();
    assert_eq!(err.stage(), Some(PipelineStage::Fit));
    assert!(matches!(err.root(), ForecastError::ModelFit(_)));
    assert_eq!(warehouse.writes(), 0);
}

#[test]
fn test_constant_series_fails_to_fit() {
    let dates: Vec<String> = (0..21).map(|t| day(t).to_string()).collect();
    let prices = vec![None; 21];
    let mut warehouse = MemoryWarehouse::new().with_table("RAW_DATA", frame(&dates, &prices));

    let err = forecast_total_income(&mut warehouse, &PipelineConfig::default()).unwrap_err();
    assert_eq!(err.stage(), Some(PipelineStage::Fit));
    assert!(err.to_string().contains("fit stage failed"));
    assert!(!warehouse.contains("FORECASTED_INCOME"));
}

#[test]
fn test_missing_source_fails_to_load() {
    let mut warehouse = MemoryWarehouse::new();
    let err = forecast_total_income(&mut warehouse, &PipelineConfig::default()).unwrap_err();
    assert_eq!(err.stage(), Some(PipelineStage::Load));
    assert!(matches!(err.root(), ForecastError::DataAccess(_)));
}

#[test]
fn test_rejected_write_leaves_no_tables() {
    let mut warehouse = warehouse(21).reject_writes_to("FORECASTED_INCOME");

    let err = forecast_total_income(&mut warehouse, &PipelineConfig::default()).unwrap_err();
    assert_eq!(err.stage(), Some(PipelineStage::Persist));
    assert!(matches!(err.root(), ForecastError::Persistence(_)));
    assert!(!warehouse.contains("HISTORICAL_AVG_INCOME"));
}

#[test]
fn test_custom_column_names() {
    let (dates, prices) = raw_sales(14);
    let df = DataFrame::new(vec![
        Series::new("sold_at", dates),
        Series::new("amount", prices),
    ])
    .unwrap();
    let mut warehouse = MemoryWarehouse::new().with_table("ORDERS", df);

    let config = PipelineConfig {
        source_table: "ORDERS".to_string(),
        date_column: "SOLD_AT".to_string(),
        price_column: "AMOUNT".to_string(),
        historical_table: "DAILY".to_string(),
        forecast_table: "NEXT_TWO_WEEKS".to_string(),
        ..PipelineConfig::default()
    };
    forecast_total_income(&mut warehouse, &config).unwrap();
    assert_eq!(warehouse.table("DAILY").unwrap().height(), 14);
    assert_eq!(warehouse.table("NEXT_TWO_WEEKS").unwrap().height(), 14);
}

#[test]
fn test_noisy_sales_give_finite_intervals() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut dates = Vec::new();
    let mut prices = Vec::new();
    for t in 0..56 {
        for _ in 0..rng.gen_range(1..5) {
            dates.push(day(t).to_string());
            prices.push(Some(daily_income(t) + rng.gen_range(-40.0..40.0)));
        }
    }

    let pipeline = ForecastPipeline::new(PipelineConfig {
        confidence_level: 0.8,
        ..PipelineConfig::default()
    })
    .unwrap();
    let outcome = pipeline.run_pure(&frame(&dates, &prices)).unwrap();
    let forecast = &outcome.output().unwrap().forecast;

    assert_eq!(forecast.len(), FORECAST_HORIZON);
    let intervals = forecast.intervals().unwrap();
    for ((lo, hi), v) in intervals.iter().zip(forecast.values()) {
        assert!(v.is_finite());
        assert!(lo < v && v < hi);
    }
    assert_eq!(forecast.confidence_level(), Some(0.8));
}
