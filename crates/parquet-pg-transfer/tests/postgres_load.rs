//! Bulk load tests against a live PostgreSQL.
//!
//! Run with `cargo test -- --ignored` after exporting `PG_TEST_HOST`, `PG_TEST_PORT`,
//! `PG_TEST_DATABASE`, `PG_TEST_USER` and `PG_TEST_PASSWORD`.

use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use parquet_pg_transfer::target::connect;
use parquet_pg_transfer::{BulkLoader, Dataset, PgBulkLoader, TargetConfig, TransferError};

fn target() -> TargetConfig {
    let var = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.to_string());
    TargetConfig {
        host: var("PG_TEST_HOST", "localhost"),
        port: var("PG_TEST_PORT", "5432").parse().unwrap(),
        database: var("PG_TEST_DATABASE", "postgres"),
        user: var("PG_TEST_USER", "postgres"),
        password: var("PG_TEST_PASSWORD", "postgres"),
        schema: None,
        ssl_mode: "disable".to_string(),
        connect_timeout_secs: 10,
    }
}

async fn recreate(table: &str) {
    let client = connect(&target()).await.unwrap();
    client
        .batch_execute(&format!(
            "DROP TABLE IF EXISTS {t}; \
             CREATE TABLE {t} (id BIGINT NOT NULL, name TEXT, score DOUBLE PRECISION)",
            t = table
        ))
        .await
        .unwrap();
}

fn dataset(columns: &[&str]) -> Dataset {
    let fields: Vec<Field> = columns
        .iter()
        .map(|name| match *name {
            "id" => Field::new("id", DataType::Int64, false),
            "name" => Field::new("name", DataType::Utf8, true),
            "score" => Field::new("score", DataType::Float64, true),
            other => Field::new(other, DataType::Utf8, true),
        })
        .collect();
    let arrays = columns
        .iter()
        .map(|name| -> arrow::array::ArrayRef {
            match *name {
                "id" => Arc::new(Int64Array::from(vec![1, 2, 3])),
                "name" => Arc::new(StringArray::from(vec![Some("Ada"), None, Some("")])),
                "score" => Arc::new(Float64Array::from(vec![Some(1.5), Some(2.0), None])),
                _ => Arc::new(StringArray::from(vec![Some("x"), Some("y"), Some("z")])),
            }
        })
        .collect();
    Dataset::try_new(Arc::new(Schema::new(fields)), arrays).unwrap()
}

#[tokio::test]
#[ignore]
async fn test_nulls_and_empty_strings_survive_load() {
    recreate("pgt_nulls").await;
    let rows = PgBulkLoader::new(2)
        .load(&dataset(&["id", "name", "score"]), "pgt_nulls", &target())
        .await
        .unwrap();
    assert_eq!(rows, 3);

    let client = connect(&target()).await.unwrap();
    let rows = client
        .query("SELECT id, name, score FROM pgt_nulls ORDER BY id", &[])
        .await
        .unwrap();
    let names: Vec<Option<String>> = rows.iter().map(|r| r.get(1)).collect();
    assert_eq!(
        names,
        vec![Some("Ada".to_string()), None, Some(String::new())]
    );
    let scores: Vec<Option<f64>> = rows.iter().map(|r| r.get(2)).collect();
    assert_eq!(scores, vec![Some(1.5), Some(2.0), None]);
}

#[tokio::test]
#[ignore]
async fn test_column_order_does_not_matter() {
    recreate("pgt_permuted").await;
    PgBulkLoader::default()
        .load(&dataset(&["score", "name", "id"]), "pgt_permuted", &target())
        .await
        .unwrap();

    let client = connect(&target()).await.unwrap();
    let row = client
        .query_one("SELECT id, name, score FROM pgt_permuted WHERE id = 1", &[])
        .await
        .unwrap();
    assert_eq!(row.get::<_, Option<String>>(1).as_deref(), Some("Ada"));
    assert_eq!(row.get::<_, Option<f64>>(2), Some(1.5));
}

#[tokio::test]
#[ignore]
async fn test_unknown_column_is_schema_mismatch_and_rolls_back() {
    recreate("pgt_mismatch").await;
    let err = PgBulkLoader::default()
        .load(&dataset(&["id", "bogus"]), "pgt_mismatch", &target())
        .await
        .unwrap_err();
    match err {
        TransferError::SchemaMismatch { message, .. } => assert!(message.contains("bogus")),
        other => panic!("unexpected error: {:?}", other),
    }

    let client = connect(&target()).await.unwrap();
    let count: i64 = client
        .query_one("SELECT count(*) FROM pgt_mismatch", &[])
        .await
        .unwrap()
        .get(0);
    assert_eq!(count, 0);
}

#[tokio::test]
#[ignore]
async fn test_constraint_violation_is_load_error() {
    recreate("pgt_violation").await;
    let schema = Arc::new(Schema::new(vec![Field::new("name", DataType::Utf8, true)]));
    let ds = Dataset::try_new(
        schema,
        vec![Arc::new(StringArray::from(vec![Some("no id")]))],
    )
    .unwrap();
    let err = PgBulkLoader::default()
        .load(&ds, "pgt_violation", &target())
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::Load { .. }));
}
