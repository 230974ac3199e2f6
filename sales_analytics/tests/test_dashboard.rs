use polars::prelude::*;
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};
use sales_analytics::dashboard::{
    CategoryCount, SalesColumns, SalesFilter, SalesFrame, DEFAULT_PRICE_BOUNDS, UNKNOWN_LABEL,
};
use sales_analytics::warehouse::{MemoryWarehouse, SqliteWarehouse};
use sales_analytics::ForecastError;

fn raw_table() -> DataFrame {
    DataFrame::new(vec![
        Series::new(
            "TOTAL_PRICE",
            &[Some(1200.0), Some(300.0), Some(450.0), None, Some(80.0), Some(950.0)],
        ),
        Series::new("QUANTITY", &[Some(2i64), Some(6), Some(3), Some(1), Some(4), Some(1)]),
        Series::new(
            "PRODUCT_NAME",
            &[Some("Laptop Bag"), Some("Tea"), Some("Rice"), Some("Tea"), Some("Rice"), None],
        ),
        Series::new(
            "LOCATION",
            &[Some("Colombo"), Some("Kandy"), Some("Colombo"), Some("Galle"), Some("Kandy"), Some("Colombo")],
        ),
        Series::new(
            "PURCHASING_TYPE",
            &[Some("Card"), Some("Cash"), Some("Card"), Some("Card"), None, Some("Cash")],
        ),
        Series::new(
            "DEVICE_TYPE",
            &[Some("Mobile"), Some("Desktop"), Some("Mobile"), Some("Mobile"), Some("Tablet"), Some("Desktop")],
        ),
        Series::new("PURCHASE_DATE", &["2024-01-01"; 6]),
    ])
    .unwrap()
}

#[fixture]
fn frame() -> SalesFrame {
    let warehouse = MemoryWarehouse::new().with_table("RAW_DATA", raw_table());
    SalesFrame::load(&warehouse, "RAW_DATA", &SalesColumns::default()).unwrap()
}

#[rstest]
fn test_load_reads_every_row(frame: SalesFrame) {
    assert_eq!(frame.len(), 6);
    assert_eq!(frame.records()[1].quantity, Some(6.0));
    assert_eq!(frame.records()[5].product_name, None);
}

#[rstest]
fn test_price_bounds_and_locations(frame: SalesFrame) {
    assert_eq!(frame.price_bounds(), (80.0, 1200.0));
    assert_eq!(frame.locations(), vec!["Colombo", "Galle", "Kandy"]);
    assert_eq!(SalesFrame::default().price_bounds(), DEFAULT_PRICE_BOUNDS);
}

#[rstest]
fn test_summary_unfiltered(frame: SalesFrame) {
    let summary = frame.summary(&SalesFilter::new());
    assert_eq!(summary.total_orders, 6);
    assert_eq!(summary.total_revenue, 2980.0);
    assert!((summary.average_order_value - 2980.0 / 6.0).abs() < 1e-9);
}

#[rstest]
fn test_summary_with_price_range_and_location(frame: SalesFrame) {
    let filter = SalesFilter::new()
        .with_price_range(100.0, 1000.0)
        .unwrap()
        .with_location("Colombo");
    let summary = frame.summary(&filter);
    // 450 and 950 from Colombo; the priceless Galle row never matches a range
    assert_eq!(summary.total_orders, 2);
    assert_eq!(summary.total_revenue, 1400.0);
}

#[rstest]
fn test_top_products(frame: SalesFrame) {
    let top = frame.top_products(&SalesFilter::new(), 3);
    let ranked: Vec<(&str, f64)> = top
        .iter()
        .map(|p| (p.product.as_str(), p.quantity_sold))
        .collect();
    assert_eq!(ranked, vec![("Rice", 7.0), ("Tea", 7.0), ("Laptop Bag", 2.0)]);
    assert_eq!(top[0].revenue, 530.0);

    let top = frame.top_products(&SalesFilter::new(), 10);
    assert_eq!(top.len(), 4);
    assert_eq!(top[3].product, UNKNOWN_LABEL);
}

#[rstest]
fn test_sales_by_location_ignores_location_filter(frame: SalesFrame) {
    let filter = SalesFilter::new().with_location("Kandy");
    let rows = frame.sales_by_location(&filter);
    let names: Vec<&str> = rows.iter().map(|r| r.location.as_str()).collect();
    assert_eq!(names, vec!["Colombo", "Kandy", "Galle"]);
    assert_eq!(rows[0].revenue, 2600.0);
    assert_eq!(rows[0].order_count, 3);
    assert_eq!(rows[2].revenue, 0.0);
}

#[rstest]
fn test_category_distributions(frame: SalesFrame) {
    let payments = frame.payment_distribution(&SalesFilter::new());
    assert_eq!(
        payments,
        vec![
            CategoryCount { category: "Card".to_string(), count: 3 },
            CategoryCount { category: "Cash".to_string(), count: 2 },
            CategoryCount { category: UNKNOWN_LABEL.to_string(), count: 1 },
        ]
    );

    let devices = frame.device_distribution(&SalesFilter::new().with_location("Colombo"));
    assert_eq!(
        devices,
        vec![
            CategoryCount { category: "Mobile".to_string(), count: 2 },
            CategoryCount { category: "Desktop".to_string(), count: 1 },
        ]
    );
}

#[test]
fn test_load_from_sqlite_with_text_prices() {
    let warehouse = SqliteWarehouse::in_memory().unwrap();
    warehouse
        .connection()
        .execute_batch(
            "CREATE TABLE RAW_DATA (TOTAL_PRICE TEXT, QUANTITY INTEGER, PRODUCT_NAME TEXT,
                LOCATION TEXT, PURCHASING_TYPE TEXT, DEVICE_TYPE TEXT);
             INSERT INTO RAW_DATA VALUES ('19.5', 1, 'Tea', 'Kandy', 'Cash', 'Mobile');
             INSERT INTO RAW_DATA VALUES ('n/a', 2, 'Tea', 'Kandy', 'Cash', 'Mobile');",
        )
        .unwrap();

    let frame = SalesFrame::load(&warehouse, "RAW_DATA", &SalesColumns::default()).unwrap();
    assert_eq!(frame.summary(&SalesFilter::new()).total_revenue, 19.5);
    assert_eq!(frame.top_products(&SalesFilter::new(), 5)[0].quantity_sold, 3.0);
}

#[test]
fn test_missing_column_is_reported() {
    let df = raw_table().drop("DEVICE_TYPE").unwrap();
    let warehouse = MemoryWarehouse::new().with_table("RAW_DATA", df);
    let err = SalesFrame::load(&warehouse, "RAW_DATA", &SalesColumns::default()).unwrap_err();
    assert!(matches!(err, ForecastError::DataAccess(_)));
}
