//! # Sales Insight
//!
//! `sales_insight` bundles the sales forecasting workspace behind one crate.
//!
//! ## Example
//!
//! ```
//! use sales_insight::analytics::dashboard::{SalesFilter, SalesFrame, SalesRecord};
//!
//! let frame = SalesFrame::from_records(vec![SalesRecord {
//!     total_price: Some(120.0),
//!     location: Some("Kandy".to_string()),
//!     ..SalesRecord::default()
//! }]);
//! let summary = frame.summary(&SalesFilter::new().with_location("Kandy"));
//! assert_eq!(summary.total_orders, 1);
//! assert_eq!(summary.total_revenue, 120.0);
//! ```

/// Loading, aggregation, forecasting pipeline, warehouses and dashboard queries
pub use sales_analytics as analytics;

/// Holt-Winters smoothing, optimiser and accuracy metrics
pub use sales_math as math;

pub use sales_analytics::{
    forecast_total_income, ForecastError, ForecastOutcome, ForecastPipeline, PipelineConfig,
    Settings,
};
