//! Query mapping integration tests.
//!
//! Scalar and flat-object queries against an in-memory SQLite database, plus
//! mid-stream failure behavior through the scripted driver.

use futures::StreamExt;
use sqlmapper::driver::{MemoryConnection, StatementOutcome};
use sqlmapper::{
    ConnectInfo, Executor, FromRow, MapperError, Parameters, Result, Row, RowView, Value,
};

#[derive(Debug, Default, PartialEq)]
struct Item {
    value: String,
}

impl FromRow for Item {
    fn from_row(view: &RowView<'_>) -> Result<Self> {
        Ok(Self {
            value: view.get("value")?,
        })
    }
}

#[derive(Debug, Default, PartialEq)]
struct Person {
    id: i64,
    name: String,
}

impl FromRow for Person {
    fn from_row(view: &RowView<'_>) -> Result<Self> {
        Ok(Self {
            id: view.get("id")?,
            name: view.get("name")?,
        })
    }
}

/// Helper to open an executor on a fresh in-memory database.
async fn open_executor() -> Executor {
    Executor::connect(&ConnectInfo::sqlite_memory())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_scalar_query_with_bound_parameter() {
    let executor = open_executor().await;

    let values: Vec<String> = executor
        .query_scalar(
            "SELECT 'abc' AS value UNION ALL SELECT :txt",
            Parameters::new().with("txt", "def"),
        )
        .await
        .unwrap();

    assert_eq!(values, vec!["abc", "def"]);

    executor.close().await.unwrap();
}

#[tokio::test]
async fn test_flat_object_query_with_bound_parameter() {
    let executor = open_executor().await;

    let items: Vec<Item> = executor
        .query_as(
            "SELECT 'abc' AS value UNION ALL SELECT :txt",
            Parameters::new().with("txt", "def"),
        )
        .await
        .unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].value, "abc");
    assert_eq!(items[1].value, "def");

    executor.close().await.unwrap();
}

#[tokio::test]
async fn test_flat_object_unmatched_fields_stay_default() {
    let executor = open_executor().await;

    let people: Vec<Person> = executor
        .query_as("SELECT 'x' AS name, 99 AS extra", ())
        .await
        .unwrap();

    // No "id" column: the field keeps its default. "extra" is ignored.
    assert_eq!(
        people,
        vec![Person {
            id: 0,
            name: "x".into()
        }]
    );
}

#[tokio::test]
async fn test_column_names_match_case_insensitively() {
    let executor = open_executor().await;

    let people: Vec<Person> = executor
        .query_as("SELECT 7 AS ID, 'abc' AS NAME", ())
        .await
        .unwrap();

    assert_eq!(people[0].id, 7);
    assert_eq!(people[0].name, "abc");
}

#[tokio::test]
async fn test_streamed_rows_stay_valid_after_consumption() {
    let executor = open_executor().await;
    executor
        .execute("CREATE TABLE people (name TEXT)", ())
        .await
        .unwrap();
    executor
        .execute_batch(
            "INSERT INTO people (name) VALUES (:name)",
            ["a", "b", "c"].map(|n| Parameters::new().with("name", n)),
        )
        .await
        .unwrap();

    let mut stream = executor
        .query_rows("SELECT name FROM people ORDER BY name", ())
        .await
        .unwrap();

    let mut rows = Vec::new();
    while let Some(row) = stream.next().await {
        rows.push(row.unwrap());
    }
    drop(stream);

    // Earlier rows are owned values, untouched by later consumption.
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].value("name"), Some(&Value::Text("a".into())));
    assert_eq!(rows[2].value("name"), Some(&Value::Text("c".into())));
}

#[tokio::test]
async fn test_mid_stream_cast_failure_leaves_neighbours_valid() {
    let conn = MemoryConnection::new().with_rows(
        "select",
        vec![
            Row::from_pairs([("id", Value::Int(1)), ("name", Value::Text("abc".into()))]),
            Row::from_pairs([("id", Value::Int(2)), ("name", Value::Int(7))]),
            Row::from_pairs([("id", Value::Int(3)), ("name", Value::Text("ghi".into()))]),
        ],
    );
    let executor = Executor::from_connection(Box::new(conn));

    let stream = executor
        .query_stream::<Person, _>("SELECT id, name FROM people", ())
        .await
        .unwrap();
    let items: Vec<_> = stream.collect().await;

    // The bad row fails in place; rows before and after still map.
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].as_ref().unwrap().name, "abc");
    assert!(matches!(items[1], Err(MapperError::TypeMismatch(_))));
    assert_eq!(items[2].as_ref().unwrap().id, 3);
}

#[tokio::test]
async fn test_mid_stream_driver_error_surfaces_in_place() {
    let conn = MemoryConnection::new().with_handler("select", |_| {
        Ok(
            StatementOutcome::rows(vec![Row::from_pairs([("name", Value::Text("abc".into()))])])
                .with_row_error("connection reset"),
        )
    });
    let executor = Executor::from_connection(Box::new(conn));

    let mut stream = executor.query_rows("SELECT name FROM t", ()).await.unwrap();

    let first = stream.next().await.unwrap().unwrap();
    let second = stream.next().await.unwrap();
    assert!(matches!(second, Err(MapperError::Execution(_))));
    assert!(stream.next().await.is_none());

    // The row yielded before the failure is untouched by it.
    assert_eq!(first.value("name"), Some(&Value::Text("abc".into())));
}

#[tokio::test]
async fn test_execute_inserting_two_rows_reports_two() {
    let executor = open_executor().await;
    executor
        .execute("CREATE TABLE t (i INTEGER)", ())
        .await
        .unwrap();

    let affected = executor
        .execute(
            "INSERT INTO t (i) SELECT :a UNION ALL SELECT :b",
            Parameters::new().with("a", 1).with("b", 2),
        )
        .await
        .unwrap();

    assert_eq!(affected, 2);
}

#[tokio::test]
async fn test_batch_of_four_then_sum() {
    let executor = open_executor().await;
    executor
        .execute("CREATE TABLE t (i INTEGER)", ())
        .await
        .unwrap();

    let sets: Vec<Parameters> = (1..=4).map(|a| Parameters::new().with("a", a)).collect();
    let total = executor
        .execute_batch("INSERT INTO t (i) VALUES (:a)", sets)
        .await
        .unwrap();
    assert_eq!(total, 4);

    let sums: Vec<i64> = executor
        .query_scalar("SELECT SUM(i) FROM t", ())
        .await
        .unwrap();
    assert_eq!(sums, vec![10]);

    executor.close().await.unwrap();
}

#[tokio::test]
async fn test_scalar_cast_failure_is_type_mismatch() {
    let executor = open_executor().await;

    let err = executor
        .query_scalar::<i64, _>("SELECT 'abc' AS value", ())
        .await
        .unwrap_err();

    assert!(matches!(err, MapperError::TypeMismatch(_)));
}

#[tokio::test]
async fn test_scalar_rejects_multi_column_rows() {
    let executor = open_executor().await;

    let err = executor
        .query_scalar::<i64, _>("SELECT 1 AS a, 2 AS b", ())
        .await
        .unwrap_err();

    assert!(matches!(err, MapperError::TypeMismatch(_)));
    assert!(err.to_string().contains("expected exactly 1"));
}

#[tokio::test]
async fn test_missing_parameter_is_binding_error() {
    let executor = open_executor().await;

    let err = executor
        .query_scalar::<i64, _>("SELECT :a + :b", Parameters::new().with("a", 1))
        .await
        .unwrap_err();

    assert!(matches!(err, MapperError::Binding(_)));
    assert!(err.to_string().contains("'b'"));
}

#[tokio::test]
async fn test_unreferenced_parameters_are_ignored() {
    let executor = open_executor().await;

    let values: Vec<i64> = executor
        .query_scalar(
            "SELECT :a + 1",
            Parameters::new().with("a", 1).with("unused", 99),
        )
        .await
        .unwrap();

    assert_eq!(values, vec![2]);
}

#[tokio::test]
async fn test_missing_table_is_execution_error() {
    let executor = open_executor().await;

    let err = executor
        .query_scalar::<i64, _>("SELECT i FROM missing_table", ())
        .await
        .unwrap_err();

    assert!(matches!(err, MapperError::Execution(_)));
    assert!(err.to_string().contains("missing_table"));
}

#[tokio::test]
async fn test_parameters_inside_literals_are_not_bound() {
    let executor = open_executor().await;

    // The ':b' inside the string literal is data, not a placeholder.
    let values: Vec<String> = executor
        .query_scalar("SELECT ':b' AS value WHERE :a = 1", Parameters::new().with("a", 1))
        .await
        .unwrap();

    assert_eq!(values, vec![":b"]);
}
