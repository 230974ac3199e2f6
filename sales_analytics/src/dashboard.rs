//! Aggregate queries behind the sales dashboard
//!
//! Filters are structured values, never SQL fragments: a price range and an
//! optional location. Every query takes the filter it should honour, so the
//! location breakdown can drop the location predicate without string editing.

use crate::error::{ForecastError, Result};
use crate::utils::{float_column, text_column};
use crate::warehouse::TableSource;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Price bounds reported when no prices exist
pub const DEFAULT_PRICE_BOUNDS: (f64, f64) = (0.0, 10_000.0);

/// Upper limit on the number of products in a ranking
pub const MAX_TOP_PRODUCTS: usize = 5;

/// Group label for rows with no value in a categorical column
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Column names of the raw sales table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SalesColumns {
    pub total_price: String,
    pub quantity: String,
    pub product_name: String,
    pub location: String,
    pub purchasing_type: String,
    pub device_type: String,
}

impl Default for SalesColumns {
    fn default() -> Self {
        Self {
            total_price: "TOTAL_PRICE".to_string(),
            quantity: "QUANTITY".to_string(),
            product_name: "PRODUCT_NAME".to_string(),
            location: "LOCATION".to_string(),
            purchasing_type: "PURCHASING_TYPE".to_string(),
            device_type: "DEVICE_TYPE".to_string(),
        }
    }
}

impl SalesColumns {
    fn names(&self) -> [&str; 6] {
        [
            &self.total_price,
            &self.quantity,
            &self.product_name,
            &self.location,
            &self.purchasing_type,
            &self.device_type,
        ]
    }
}

/// One purchase as the dashboard sees it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SalesRecord {
    pub total_price: Option<f64>,
    pub quantity: Option<f64>,
    pub product_name: Option<String>,
    pub location: Option<String>,
    pub purchasing_type: Option<String>,
    pub device_type: Option<String>,
}

/// Row selection shared by all dashboard queries
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SalesFilter {
    price_range: Option<(f64, f64)>,
    location: Option<String>,
}

impl SalesFilter {
    /// A filter that keeps every row
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep rows whose price lies in `[min, max]`; rows without a price are dropped
    pub fn with_price_range(mut self, min: f64, max: f64) -> Result<Self> {
        if !(min.is_finite() && max.is_finite() && min <= max) {
            return Err(ForecastError::InvalidParameter(format!(
                "Invalid price range: min={min}, max={max}"
            )));
        }
        self.price_range = Some((min, max));
        Ok(self)
    }

    /// Keep rows from one location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// The same filter without its location predicate
    pub fn without_location(&self) -> Self {
        Self {
            price_range: self.price_range,
            location: None,
        }
    }

    pub fn price_range(&self) -> Option<(f64, f64)> {
        self.price_range
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Whether `record` passes the filter
    pub fn matches(&self, record: &SalesRecord) -> bool {
        if let Some((min, max)) = self.price_range {
            match record.total_price {
                Some(price) if price >= min && price <= max => {}
                _ => return false,
            }
        }
        match &self.location {
            Some(wanted) => record.location.as_deref() == Some(wanted.as_str()),
            None => true,
        }
    }
}

/// Headline metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SalesSummary {
    pub total_revenue: f64,
    pub total_orders: usize,
    pub average_order_value: f64,
}

/// A product's position in the top-sellers ranking
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSales {
    pub product: String,
    pub quantity_sold: f64,
    pub revenue: f64,
}

/// Revenue and order count for one location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationSales {
    pub location: String,
    pub revenue: f64,
    pub order_count: usize,
}

/// Usage count of one category value (payment method or device type)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

/// In-memory copy of the sales table
#[derive(Debug, Clone, Default)]
pub struct SalesFrame {
    records: Vec<SalesRecord>,
}

impl SalesFrame {
    pub fn from_records(records: Vec<SalesRecord>) -> Self {
        Self { records }
    }

    /// Load the dashboard columns of `table`
    pub fn load<S: TableSource + ?Sized>(
        source: &S,
        table: &str,
        columns: &SalesColumns,
    ) -> Result<Self> {
        let df = source.load_table(table, &columns.names())?;
        Self::from_dataframe(&df, columns)
    }

    /// Read records from a frame holding the dashboard columns
    pub fn from_dataframe(df: &DataFrame, columns: &SalesColumns) -> Result<Self> {
        let get = |name: &str| {
            df.column(name).map_err(|_| {
                ForecastError::DataAccess(format!("Column '{name}' not found in sales data"))
            })
        };

        let prices = float_column(get(&columns.total_price)?)?;
        let quantities = float_column(get(&columns.quantity)?)?;
        let products = text_column(get(&columns.product_name)?)?;
        let locations = text_column(get(&columns.location)?)?;
        let payments = text_column(get(&columns.purchasing_type)?)?;
        let devices = text_column(get(&columns.device_type)?)?;

        let records = prices
            .into_iter()
            .zip(quantities)
            .zip(products)
            .zip(locations)
            .zip(payments)
            .zip(devices)
            .map(
                |(((((total_price, quantity), product_name), location), purchasing_type), device_type)| {
                    SalesRecord {
                        total_price,
                        quantity,
                        product_name,
                        location,
                        purchasing_type,
                        device_type,
                    }
                },
            )
            .collect();
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[SalesRecord] {
        &self.records
    }

    fn filtered<'a>(&'a self, filter: &'a SalesFilter) -> impl Iterator<Item = &'a SalesRecord> + 'a {
        self.records.iter().filter(move |r| filter.matches(r))
    }

    /// Lowest and highest total price, for sizing a price slider
    pub fn price_bounds(&self) -> (f64, f64) {
        self.records
            .iter()
            .filter_map(|r| r.total_price)
            .fold(None, |acc: Option<(f64, f64)>, p| match acc {
                None => Some((p, p)),
                Some((lo, hi)) => Some((lo.min(p), hi.max(p))),
            })
            .unwrap_or(DEFAULT_PRICE_BOUNDS)
    }

    /// Distinct locations, sorted
    pub fn locations(&self) -> Vec<String> {
        self.records
            .iter()
            .filter_map(|r| r.location.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Revenue, order count and average order value of the filtered rows
    pub fn summary(&self, filter: &SalesFilter) -> SalesSummary {
        let (total_revenue, total_orders) = self
            .filtered(filter)
            .fold((0.0, 0usize), |(revenue, orders), r| {
                (revenue + r.total_price.unwrap_or(0.0), orders + 1)
            });
        let average_order_value = if total_orders > 0 {
            total_revenue / total_orders as f64
        } else {
            0.0
        };
        SalesSummary {
            total_revenue,
            total_orders,
            average_order_value,
        }
    }

    /// Best-selling products by quantity; `limit` is clamped to `1..=5`
    pub fn top_products(&self, filter: &SalesFilter, limit: usize) -> Vec<ProductSales> {
        let mut groups: BTreeMap<String, (f64, f64)> = BTreeMap::new();
        for r in self.filtered(filter) {
            let entry = groups.entry(label(&r.product_name)).or_insert((0.0, 0.0));
            entry.0 += r.quantity.unwrap_or(0.0);
            entry.1 += r.total_price.unwrap_or(0.0);
        }

        let mut ranked: Vec<ProductSales> = groups
            .into_iter()
            .map(|(product, (quantity_sold, revenue))| ProductSales {
                product,
                quantity_sold,
                revenue,
            })
            .collect();
        // stable sort keeps the map's name order among ties
        ranked.sort_by(|a, b| descending(a.quantity_sold, b.quantity_sold));
        ranked.truncate(limit.clamp(1, MAX_TOP_PRODUCTS));
        ranked
    }

    /// Revenue and orders per location, ignoring the filter's location
    pub fn sales_by_location(&self, filter: &SalesFilter) -> Vec<LocationSales> {
        let filter = filter.without_location();
        let mut groups: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for r in self.filtered(&filter) {
            let entry = groups.entry(label(&r.location)).or_insert((0.0, 0));
            entry.0 += r.total_price.unwrap_or(0.0);
            entry.1 += 1;
        }

        let mut rows: Vec<LocationSales> = groups
            .into_iter()
            .map(|(location, (revenue, order_count))| LocationSales {
                location,
                revenue,
                order_count,
            })
            .collect();
        rows.sort_by(|a, b| descending(a.revenue, b.revenue));
        rows
    }

    /// How often each payment method was used
    pub fn payment_distribution(&self, filter: &SalesFilter) -> Vec<CategoryCount> {
        self.count_by(filter, |r| &r.purchasing_type)
    }

    /// How often each device type was used
    pub fn device_distribution(&self, filter: &SalesFilter) -> Vec<CategoryCount> {
        self.count_by(filter, |r| &r.device_type)
    }

    fn count_by<F>(&self, filter: &SalesFilter, key: F) -> Vec<CategoryCount>
    where
        F: Fn(&SalesRecord) -> &Option<String>,
    {
        let mut groups: BTreeMap<String, usize> = BTreeMap::new();
        for r in self.filtered(filter) {
            *groups.entry(label(key(r))).or_insert(0) += 1;
        }

        let mut rows: Vec<CategoryCount> = groups
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect();
        rows.sort_by(|a, b| b.count.cmp(&a.count));
        rows
    }
}

fn label(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| UNKNOWN_LABEL.to_string())
}

fn descending(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(price: f64, qty: f64, product: &str, location: &str) -> SalesRecord {
        SalesRecord {
            total_price: Some(price),
            quantity: Some(qty),
            product_name: Some(product.to_string()),
            location: Some(location.to_string()),
            purchasing_type: Some("Card".to_string()),
            device_type: Some("Mobile".to_string()),
        }
    }

    #[test]
    fn test_filter_matching() {
        let r = record(500.0, 1.0, "Tea", "Kandy");
        assert!(SalesFilter::new().matches(&r));
        assert!(SalesFilter::new().with_price_range(100.0, 500.0).unwrap().matches(&r));
        assert!(!SalesFilter::new().with_price_range(0.0, 499.0).unwrap().matches(&r));
        assert!(!SalesFilter::new().with_location("Galle").matches(&r));

        let no_price = SalesRecord::default();
        assert!(SalesFilter::new().matches(&no_price));
        assert!(!SalesFilter::new().with_price_range(0.0, 1.0).unwrap().matches(&no_price));
    }

    #[test]
    fn test_invalid_price_range() {
        assert!(SalesFilter::new().with_price_range(10.0, 1.0).is_err());
        assert!(SalesFilter::new().with_price_range(f64::NAN, 1.0).is_err());
    }

    #[test]
    fn test_empty_frame_defaults() {
        let frame = SalesFrame::default();
        assert_eq!(frame.price_bounds(), DEFAULT_PRICE_BOUNDS);
        let summary = frame.summary(&SalesFilter::new());
        assert_eq!(summary.total_orders, 0);
        assert_eq!(summary.average_order_value, 0.0);
    }

    #[test]
    fn test_top_products_tie_break_by_name() {
        let frame = SalesFrame::from_records(vec![
            record(10.0, 2.0, "Milk", "Kandy"),
            record(10.0, 2.0, "Bread", "Kandy"),
            record(10.0, 5.0, "Rice", "Kandy"),
        ]);
        let top = frame.top_products(&SalesFilter::new(), 0);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].product, "Rice");

        let top = frame.top_products(&SalesFilter::new(), 99);
        let names: Vec<&str> = top.iter().map(|p| p.product.as_str()).collect();
        assert_eq!(names, vec!["Rice", "Bread", "Milk"]);
    }
}
