//! Deferred-result facade and configuration integration tests.

use sqlmapper::{Backend, ConnectInfo, Executor, MapperError, Parameters, Profiles};

/// Installs a test subscriber so RUST_LOG can surface mapper traces.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wait_blocks_until_ready() {
    init_tracing();
    let executor = Executor::connect(&ConnectInfo::sqlite_memory())
        .await
        .unwrap();

    let values: Vec<i64> = executor
        .query_scalar("SELECT 40 + :a", Parameters::new().with("a", 2))
        .wait()
        .unwrap();

    assert_eq!(values, vec![42]);
}

#[tokio::test]
async fn test_try_take_eventually_yields_the_result() {
    let executor = Executor::connect(&ConnectInfo::sqlite_memory())
        .await
        .unwrap();

    let mut pending = executor.query_scalar::<i64, _>("SELECT 1", ());
    let values = loop {
        match pending.try_take() {
            Ok(result) => break result.unwrap(),
            Err(p) => {
                pending = p;
                tokio::task::yield_now().await;
            }
        }
    };

    assert_eq!(values, vec![1]);
}

#[tokio::test]
async fn test_submitted_operations_all_complete() {
    let executor = Executor::connect(&ConnectInfo::sqlite_memory())
        .await
        .unwrap();
    executor
        .execute("CREATE TABLE t (i INTEGER)", ())
        .await
        .unwrap();

    // Fire off a burst of inserts before awaiting any of them.
    let pendings: Vec<_> = (0..8)
        .map(|i| {
            executor.execute(
                "INSERT INTO t (i) VALUES (:i)",
                Parameters::new().with("i", i),
            )
        })
        .collect();
    for pending in pendings {
        assert_eq!(pending.await.unwrap(), 1);
    }

    let counts: Vec<i64> = executor
        .query_scalar("SELECT COUNT(*) FROM t", ())
        .await
        .unwrap();
    assert_eq!(counts, vec![8]);
}

#[tokio::test]
async fn test_file_backed_database_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.db");
    let info = ConnectInfo::sqlite_file(path.to_str().unwrap());

    let executor = Executor::connect(&info).await.unwrap();
    executor
        .execute("CREATE TABLE t (i INTEGER)", ())
        .await
        .unwrap();
    executor
        .execute("INSERT INTO t (i) VALUES (:i)", Parameters::new().with("i", 5))
        .await
        .unwrap();
    executor.close().await.unwrap();

    assert!(path.exists());

    // A fresh connection sees the persisted data.
    let executor = Executor::connect(&info).await.unwrap();
    let values: Vec<i64> = executor.query_scalar("SELECT i FROM t", ()).await.unwrap();
    assert_eq!(values, vec![5]);
    executor.close().await.unwrap();
}

#[tokio::test]
async fn test_profiles_file_feeds_connect() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profiles.toml");
    std::fs::write(
        &path,
        r#"
[connections.default]
backend = "sqlite"
database = ":memory:"
"#,
    )
    .unwrap();

    let profiles = Profiles::load_from_file(&path).unwrap();
    let info = profiles.get(None).unwrap();
    assert_eq!(info.backend, Backend::Sqlite);

    let executor = Executor::connect(info).await.unwrap();
    let ones: Vec<i64> = executor.query_scalar("SELECT 1", ()).await.unwrap();
    assert_eq!(ones, vec![1]);
}

#[tokio::test]
async fn test_connect_info_from_url() {
    let info = ConnectInfo::from_url("sqlite::memory:").unwrap();
    assert_eq!(info.backend, Backend::Sqlite);
    assert_eq!(info.database.as_deref(), Some(":memory:"));

    let err = ConnectInfo::from_url("mysql://localhost/db").unwrap_err();
    assert!(matches!(err, MapperError::Config(_)));
}

#[tokio::test]
async fn test_memory_backend_through_factory() {
    let executor = Executor::connect(&ConnectInfo::memory()).await.unwrap();

    // The scripted driver has no outcomes registered, so any statement
    // reports an execution error.
    let err = executor
        .execute("DELETE FROM anything", ())
        .await
        .unwrap_err();
    assert!(matches!(err, MapperError::Execution(_)));
}
