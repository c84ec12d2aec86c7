//! sqlmapper - An async data-mapping layer over SQL drivers.
//!
//! Binds named parameters to SQL statements, executes them against a driver,
//! and materializes result rows into caller shapes: scalars, flat objects
//! mapped by column name, or object graphs split out of joined rows. Every
//! operation returns a [`Pending`] handle that can be awaited, polled, or
//! waited on.

pub mod config;
pub mod driver;
pub mod error;
pub mod execute;
pub mod handle;
pub mod materialize;
pub mod params;
pub mod types;

pub use config::{ConnectInfo, Profiles};
pub use driver::{Backend, DriverConnection, RowStream};
pub use error::{MapperError, Result};
pub use execute::Executor;
pub use handle::Pending;
pub use materialize::{FromRow, DEFAULT_SPLIT};
pub use params::{Direction, Parameter, Parameters};
pub use types::{ColumnInfo, FromValue, Row, RowView, SqlType, Value};
