use anyhow::Context;
use log::{info, warn, LevelFilter};
use sales_analytics::dashboard::SalesFilter;
use sales_analytics::{ForecastOutcome, ForecastPipeline, Settings};
use simple_logger::SimpleLogger;
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    // optional first argument: settings file
    let path = std::env::args_os().nth(1).map(PathBuf::from);

    let settings = Settings::load(path.as_deref())
        .context("Failed to load settings; check forecast.* and SALES_* variables")?;

    SimpleLogger::new()
        .with_level(settings.level_filter().unwrap_or(LevelFilter::Info))
        .init()
        .context("Failed to initialize logger")?;

    let mut warehouse = settings
        .open_warehouse()
        .with_context(|| format!("Failed to open warehouse at {}", settings.warehouse.path.display()))?;

    let pipeline = ForecastPipeline::new(settings.pipeline.clone())?;
    match pipeline.run(warehouse.as_mut()).context("Forecast run failed")? {
        ForecastOutcome::NoData => {
            warn!(
                "No dated rows in {}; output tables left unchanged",
                settings.pipeline.source_table
            );
        }
        ForecastOutcome::Forecast(output) => {
            for (date, value) in output.forecast.dates().iter().zip(output.forecast.values()) {
                info!("{date}: {value:.2}");
            }
        }
    }

    match settings.sales_frame(warehouse.as_ref()) {
        Ok(frame) => {
            let summary = frame.summary(&SalesFilter::new());
            info!(
                "Revenue {:.2} over {} orders, {:.2} per order",
                summary.total_revenue, summary.total_orders, summary.average_order_value
            );
        }
        Err(e) => warn!("Sales summary unavailable: {e}"),
    }

    Ok(())
}
