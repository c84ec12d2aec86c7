//! Scripted in-memory driver for testing.
//!
//! Provides an in-process backend that returns predefined statement outcomes
//! for headless testing.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use super::{DriverConnection, RowStream};
use crate::error::{MapperError, Result};
use crate::params::Parameters;
use crate::types::{Row, Value};

/// The scripted result of one statement: rows for queries, an affected-row
/// count for commands, and output-parameter values for either.
#[derive(Debug, Clone, Default)]
pub struct StatementOutcome {
    rows: Vec<Row>,
    affected: u64,
    outputs: Vec<(String, Value)>,
    row_error: Option<String>,
}

impl StatementOutcome {
    /// An outcome that yields the given result rows.
    pub fn rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// An outcome that reports `affected` changed rows and no result set.
    pub fn affected(affected: u64) -> Self {
        Self {
            affected,
            ..Self::default()
        }
    }

    /// Adds an output-parameter value assigned by the statement.
    pub fn with_output(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.push((name.into(), value.into()));
        self
    }

    /// Scripts a driver failure reported after the rows, so a result stream
    /// breaks mid-read.
    pub fn with_row_error(mut self, message: impl Into<String>) -> Self {
        self.row_error = Some(message.into());
        self
    }
}

/// Computes a scripted outcome from the bound parameters.
type Handler = Arc<dyn Fn(&Parameters) -> Result<StatementOutcome> + Send + Sync>;

/// A driver connection that replays scripted outcomes based on statement
/// patterns.
///
/// Used for unit testing without a real database. Statements are matched
/// against the registered patterns case-insensitively; the first match wins,
/// and an unmatched statement is an `Execution` error.
#[derive(Clone, Default)]
pub struct MemoryConnection {
    /// Outcome mappings (pattern -> handler).
    responses: Vec<(String, Handler)>,
    /// Statements received, verbatim, in call order.
    log: Arc<Mutex<Vec<String>>>,
    closed: bool,
}

impl MemoryConnection {
    /// Creates a connection with no scripted outcomes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts result rows for statements containing `pattern`.
    pub fn with_rows(self, pattern: impl Into<String>, rows: Vec<Row>) -> Self {
        self.with_handler(pattern, move |_| Ok(StatementOutcome::rows(rows.clone())))
    }

    /// Scripts an affected-row count for statements containing `pattern`.
    pub fn with_affected(self, pattern: impl Into<String>, affected: u64) -> Self {
        self.with_handler(pattern, move |_| Ok(StatementOutcome::affected(affected)))
    }

    /// Scripts an arbitrary outcome computed from the bound parameters.
    pub fn with_handler<F>(mut self, pattern: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Parameters) -> Result<StatementOutcome> + Send + Sync + 'static,
    {
        self.responses.push((pattern.into(), Arc::new(handler)));
        self
    }

    /// Handle onto the verbatim statement log.
    ///
    /// Clone before handing the connection off; the log is shared, so the
    /// handle stays readable afterwards.
    pub fn statement_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.log)
    }

    /// Matches `sql` against the scripted patterns, runs the handler, and
    /// records any output parameters it assigned.
    fn dispatch(&self, sql: &str, params: &Parameters) -> Result<StatementOutcome> {
        self.log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(sql.to_string());

        if self.closed {
            return Err(MapperError::execution("connection is closed"));
        }

        let sql_lower = sql.to_lowercase();
        let handler = self
            .responses
            .iter()
            .find(|(pattern, _)| sql_lower.contains(&pattern.to_lowercase()))
            .map(|(_, handler)| handler)
            .ok_or_else(|| {
                MapperError::execution(format!("no scripted outcome matches statement: {sql}"))
            })?;

        let outcome = handler(params)?;
        for (name, value) in &outcome.outputs {
            params.record_output(name, value.clone())?;
        }
        Ok(outcome)
    }
}

#[async_trait]
impl DriverConnection for MemoryConnection {
    async fn query_raw(&mut self, sql: &str, params: &Parameters) -> Result<RowStream> {
        let outcome = self.dispatch(sql, params)?;
        let mut items: Vec<Result<Row>> = outcome.rows.into_iter().map(Ok).collect();
        if let Some(message) = outcome.row_error {
            items.push(Err(MapperError::execution(message)));
        }
        Ok(stream::iter(items).boxed())
    }

    async fn execute_raw(&mut self, sql: &str, params: &Parameters) -> Result<u64> {
        let outcome = self.dispatch(sql, params)?;
        Ok(outcome.affected)
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// A driver connection that fails every statement.
///
/// Used for testing error handling paths.
#[derive(Debug, Clone)]
pub struct FailingConnection {
    message: String,
}

impl FailingConnection {
    /// Creates a connection failing with a generic message.
    pub fn new() -> Self {
        Self::with_message("injected driver failure")
    }

    /// Creates a connection failing with the given message.
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Default for FailingConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DriverConnection for FailingConnection {
    async fn query_raw(&mut self, _sql: &str, _params: &Parameters) -> Result<RowStream> {
        Err(MapperError::execution(self.message.clone()))
    }

    async fn execute_raw(&mut self, _sql: &str, _params: &Parameters) -> Result<u64> {
        Err(MapperError::execution(self.message.clone()))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
