use std::path::Path;
use std::sync::Arc;

use ar_tools::sales_query::{NO_RESULTS, SALES_QUERY_TOOL};
use ar_tools::{SalesData, SalesQueryTool, ToolError, ToolRegistry};
use rusqlite::Connection;
use serde_json::json;

fn seed(path: &Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE sales_data (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            main_category TEXT,
            product_type TEXT,
            region TEXT,
            year INTEGER,
            revenue REAL
        );
        INSERT INTO sales_data (main_category, product_type, region, year, revenue) VALUES
            ('CLIMBING', 'HARNESSES', 'EUROPE', 2023, 100.0),
            ('CLIMBING', 'ROPES', 'AFRICA', 2024, 50.5),
            ('CAMPING', 'TENTS', 'EUROPE', 2024, 200.0);",
    )
    .unwrap();
}

async fn connected() -> (tempfile::TempDir, SalesData) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("contoso-sales.db");
    seed(&path);
    let data = SalesData::open(&path).unwrap();
    data.connect().await.unwrap();
    (dir, data)
}

#[tokio::test]
async fn database_info_describes_schema_and_values() {
    let (_dir, data) = connected().await;
    let info = data.database_info().await.unwrap();

    assert!(info.starts_with(
        "Table sales_data Schema: Columns: id: (INTEGER), main_category: (TEXT), product_type: (TEXT), region: (TEXT), year: (INTEGER), revenue: (REAL)"
    ));
    assert!(!info.contains("sqlite_sequence"));
    assert!(info.contains("\nRegions: EUROPE, AFRICA"));
    assert!(info.contains("\nProduct Types: HARNESSES, ROPES, TENTS"));
    assert!(info.contains("\nProduct Categories: CLIMBING, CAMPING"));
    assert!(info.contains("\nReporting Years: 2023, 2024"));
    assert!(info.ends_with("\n\n"));
}

#[tokio::test]
async fn query_returns_columns_and_rows() {
    let (_dir, data) = connected().await;
    let result = data
        .query("SELECT region, SUM(revenue) AS total FROM sales_data GROUP BY region ORDER BY region")
        .await
        .unwrap();
    assert_eq!(result.columns, vec!["region", "total"]);
    assert_eq!(
        result.rows,
        vec![
            vec![json!("AFRICA"), json!(50.5)],
            vec![json!("EUROPE"), json!(300.0)],
        ]
    );
}

#[tokio::test]
async fn writes_are_refused() {
    let (_dir, data) = connected().await;
    assert!(data
        .query("INSERT INTO sales_data (region) VALUES ('X')")
        .await
        .is_err());
    let rows = data.query("SELECT COUNT(*) FROM sales_data").await.unwrap();
    assert_eq!(rows.rows, vec![vec![json!(3)]]);
}

#[tokio::test]
async fn close_then_query_fails_and_reconnect_works() {
    let (_dir, data) = connected().await;
    assert!(data.is_connected());
    data.close();
    assert!(!data.is_connected());
    assert!(data.query("SELECT 1").await.is_err());
    data.connect().await.unwrap();
    assert!(data.query("SELECT 1").await.is_ok());
}

#[tokio::test]
async fn connect_to_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let data = SalesData::open(dir.path().join("missing.db")).unwrap();
    assert!(data.connect().await.is_err());
    assert!(!data.is_connected());
}

#[tokio::test]
async fn sales_query_tool_through_registry() {
    let (_dir, data) = connected().await;
    let mut registry = ToolRegistry::new();
    registry
        .register(Arc::new(SalesQueryTool::new(data)))
        .unwrap();

    let out = registry
        .execute(
            SALES_QUERY_TOOL,
            r#"{"sqlite_query":"SELECT COUNT(*) AS n FROM sales_data"}"#,
        )
        .await
        .unwrap();
    assert_eq!(out, json!({ "columns": ["n"], "rows": [[3]] }));

    let out = registry
        .execute(
            SALES_QUERY_TOOL,
            r#"{"sqlite_query":"SELECT * FROM sales_data WHERE region = 'MARS'"}"#,
        )
        .await
        .unwrap();
    assert_eq!(out, json!(NO_RESULTS));

    let err = registry
        .execute(SALES_QUERY_TOOL, r#"{"sqlite_query":"DROP TABLE sales_data"}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::Execution { .. }));

    let err = registry
        .execute(SALES_QUERY_TOOL, r#"{"query":"SELECT 1"}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::InvalidArguments { .. }));
}
