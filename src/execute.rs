//! Statement execution for sqlmapper.
//!
//! The [`Executor`] owns a driver connection and exposes the mapping
//! operations on it: streamed or buffered queries, non-query execution, and
//! batched execution. Every operation returns a [`Pending`] handle right
//! away and runs in the background.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::config::ConnectInfo;
use crate::driver::{self, DriverConnection, RowStream};
use crate::error::Result;
use crate::handle::Pending;
use crate::materialize::{map2_from_row, map3_from_row, scalar_from_row, FromRow};
use crate::params::Parameters;
use crate::types::{FromValue, Row};

type SharedConnection = Arc<Mutex<Box<dyn DriverConnection>>>;

/// Executes statements against one driver connection.
///
/// The connection serves one logical call at a time: operations queue on it
/// in submission order, and a streamed query keeps it checked out until the
/// stream is dropped or exhausted. Clones share the connection.
///
/// Operations spawn onto the current Tokio runtime, so the executor must be
/// used from within one.
#[derive(Clone)]
pub struct Executor {
    conn: SharedConnection,
}

impl Executor {
    /// Opens a connection for the given configuration.
    pub async fn connect(info: &ConnectInfo) -> Result<Self> {
        let conn = driver::connect(info).await?;
        Ok(Self::from_connection(conn))
    }

    /// Wraps an already-open driver connection.
    ///
    /// This is primarily useful for testing with scripted connections.
    pub fn from_connection(conn: Box<dyn DriverConnection>) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Runs a query and streams its rows.
    ///
    /// Rows materialize as the stream is consumed; the connection stays
    /// checked out until the stream is dropped.
    pub fn query_rows<P>(&self, sql: &str, params: P) -> Pending<RowStream>
    where
        P: Into<Parameters>,
    {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        let params = params.into();
        Pending::spawn(async move {
            params.validate()?;
            let mut guard = conn.lock_owned().await;
            debug!("Executing query: {}", sql);
            let rows = guard.query_raw(&sql, &params).await?;
            Ok(GuardedRows {
                inner: rows,
                _guard: guard,
            }
            .boxed())
        })
    }

    /// Runs a query and streams each row mapped into `T` by column name.
    pub fn query_stream<T, P>(
        &self,
        sql: &str,
        params: P,
    ) -> Pending<BoxStream<'static, Result<T>>>
    where
        T: FromRow + Send + 'static,
        P: Into<Parameters>,
    {
        let rows = self.query_rows(sql, params);
        Pending::spawn(async move {
            let rows = rows.await?;
            Ok(rows
                .map(|row| row.and_then(|r| T::from_row(&r.view())))
                .boxed())
        })
    }

    /// Runs a single-column query and buffers the values, cast to `T`.
    pub fn query_scalar<T, P>(&self, sql: &str, params: P) -> Pending<Vec<T>>
    where
        T: FromValue + Send + 'static,
        P: Into<Parameters>,
    {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        let params = params.into();
        Pending::spawn(async move {
            params.validate()?;
            let mut guard = conn.lock_owned().await;
            debug!("Executing query: {}", sql);
            let mut rows = guard.query_raw(&sql, &params).await?;
            let mut out = Vec::new();
            while let Some(row) = rows.next().await {
                out.push(scalar_from_row(&row?)?);
            }
            Ok(out)
        })
    }

    /// Runs a query and buffers each row mapped into `T` by column name.
    pub fn query_as<T, P>(&self, sql: &str, params: P) -> Pending<Vec<T>>
    where
        T: FromRow + Send + 'static,
        P: Into<Parameters>,
    {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        let params = params.into();
        Pending::spawn(async move {
            params.validate()?;
            let mut guard = conn.lock_owned().await;
            debug!("Executing query: {}", sql);
            let mut rows = guard.query_raw(&sql, &params).await?;
            let mut out = Vec::new();
            while let Some(row) = rows.next().await {
                out.push(T::from_row(&row?.view())?);
            }
            Ok(out)
        })
    }

    /// Runs a query mapping each row into two shapes split at `boundaries`,
    /// then combines them with `combine`.
    ///
    /// An empty boundary list splits at `"id"`. The combining function runs
    /// exactly once per row.
    pub fn query_map2<A, B, T, P, F>(
        &self,
        sql: &str,
        params: P,
        boundaries: &[&str],
        mut combine: F,
    ) -> Pending<Vec<T>>
    where
        A: FromRow + Send + 'static,
        B: FromRow + Send + 'static,
        T: Send + 'static,
        P: Into<Parameters>,
        F: FnMut(A, B) -> T + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        let params = params.into();
        let boundaries = own_boundaries(boundaries);
        Pending::spawn(async move {
            params.validate()?;
            let mut guard = conn.lock_owned().await;
            debug!("Executing query: {}", sql);
            let mut rows = guard.query_raw(&sql, &params).await?;
            let mut out = Vec::new();
            while let Some(row) = rows.next().await {
                out.push(map2_from_row(&row?, &boundaries, &mut combine)?);
            }
            Ok(out)
        })
    }

    /// Runs a query mapping each row into three shapes split at `boundaries`,
    /// then combines them with `combine`.
    pub fn query_map3<A, B, C, T, P, F>(
        &self,
        sql: &str,
        params: P,
        boundaries: &[&str],
        mut combine: F,
    ) -> Pending<Vec<T>>
    where
        A: FromRow + Send + 'static,
        B: FromRow + Send + 'static,
        C: FromRow + Send + 'static,
        T: Send + 'static,
        P: Into<Parameters>,
        F: FnMut(A, B, C) -> T + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        let params = params.into();
        let boundaries = own_boundaries(boundaries);
        Pending::spawn(async move {
            params.validate()?;
            let mut guard = conn.lock_owned().await;
            debug!("Executing query: {}", sql);
            let mut rows = guard.query_raw(&sql, &params).await?;
            let mut out = Vec::new();
            while let Some(row) = rows.next().await {
                out.push(map3_from_row(&row?, &boundaries, &mut combine)?);
            }
            Ok(out)
        })
    }

    /// Runs a non-query statement and reports the affected-row count.
    ///
    /// Output-parameter values recorded by the driver are readable from the
    /// parameter set afterwards.
    pub fn execute<P>(&self, sql: &str, params: P) -> Pending<u64>
    where
        P: Into<Parameters>,
    {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        let params = params.into();
        Pending::spawn(async move {
            params.validate()?;
            let mut guard = conn.lock_owned().await;
            debug!("Executing statement: {}", sql);
            let affected = guard.execute_raw(&sql, &params).await?;
            debug!("Statement affected {} rows", affected);
            Ok(affected)
        })
    }

    /// Repeats one statement for each parameter set, in order, and sums the
    /// affected-row counts.
    ///
    /// The whole batch is one logical call on the connection. The first
    /// failing set stops the batch and its error is the batch's result.
    pub fn execute_batch<I, P>(&self, sql: &str, sets: I) -> Pending<u64>
    where
        I: IntoIterator<Item = P>,
        P: Into<Parameters>,
    {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        let sets: Vec<Parameters> = sets.into_iter().map(Into::into).collect();
        Pending::spawn(async move {
            // Every set is checked before the first statement runs.
            for params in &sets {
                params.validate()?;
            }
            let mut guard = conn.lock_owned().await;
            debug!("Executing batch of {} statements", sets.len());
            let mut total = 0u64;
            for params in &sets {
                total += guard.execute_raw(&sql, params).await?;
            }
            Ok(total)
        })
    }

    /// Closes the underlying connection.
    pub async fn close(&self) -> Result<()> {
        self.conn.lock().await.close().await
    }
}

fn own_boundaries(boundaries: &[&str]) -> Vec<String> {
    boundaries.iter().map(|s| s.to_string()).collect()
}

/// A row stream that keeps the connection checked out until dropped.
struct GuardedRows {
    inner: RowStream,
    _guard: OwnedMutexGuard<Box<dyn DriverConnection>>,
}

impl Stream for GuardedRows {
    type Item = Result<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}
