//! Driver boundary for sqlmapper.
//!
//! Provides the trait the mapping layer executes against, allowing
//! different database backends to be used interchangeably.

mod memory;
mod sqlite;

pub use memory::{FailingConnection, MemoryConnection, StatementOutcome};
pub use sqlite::SqliteConnection;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::ConnectInfo;
use crate::error::Result;
use crate::params::Parameters;
use crate::types::Row;

/// A lazily-produced sequence of result rows.
///
/// Rows are materialized as they are consumed; dropping the stream abandons
/// the remainder of the result.
pub type RowStream = BoxStream<'static, Result<Row>>;

/// Supported driver backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    /// Scripted in-process backend for tests and offline use.
    Memory,
    // Future: Postgres, MySQL, etc.
}

impl Backend {
    /// Returns the backend as a string for persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
        }
    }

    /// Parses a backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            "memory" | "mem" => Some(Self::Memory),
            _ => None,
        }
    }

    /// Returns the URL scheme for this backend.
    pub fn url_scheme(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
        }
    }
}

/// Opens a driver connection for the given configuration.
///
/// This is the central factory function for driver connections.
pub async fn connect(info: &ConnectInfo) -> Result<Box<dyn DriverConnection>> {
    match info.backend {
        Backend::Sqlite => {
            let conn = SqliteConnection::connect(info).await?;
            Ok(Box::new(conn))
        }
        Backend::Memory => Ok(Box::new(MemoryConnection::new())),
    }
}

/// The database driver abstraction this layer depends on and consumes.
///
/// A connection serves one logical call at a time; the executor serializes
/// calls, so implementations may assume `query_raw`/`execute_raw` never
/// overlap on one connection.
#[async_trait]
pub trait DriverConnection: Send + Sync {
    /// Executes `sql` with the bound parameters and streams result rows.
    async fn query_raw(&mut self, sql: &str, params: &Parameters) -> Result<RowStream>;

    /// Executes `sql` with the bound parameters and returns the
    /// affected-row count. Driver-assigned output values are recorded into
    /// `params` before this returns.
    async fn execute_raw(&mut self, sql: &str, params: &Parameters) -> Result<u64>;

    /// Closes the connection.
    async fn close(&mut self) -> Result<()>;
}
