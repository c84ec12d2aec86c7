//! Configuration for sqlmapper connections.
//!
//! Handles connection URLs, environment defaults, and named connection
//! profiles loaded from TOML files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::driver::Backend;
use crate::error::{MapperError, Result};

/// Environment variables consulted by [`ConnectInfo::from_env`], in order.
const ENV_URL_VARS: [&str; 2] = ["SQLMAPPER_DATABASE_URL", "DATABASE_URL"];

/// Connection information handed to [`crate::driver::connect`].
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ConnectInfo {
    /// Driver backend.
    #[serde(default)]
    pub backend: Backend,

    /// Database location: a filesystem path, or `:memory:` for an in-memory
    /// SQLite database. Unused by the memory backend.
    pub database: Option<String>,

    /// Create the database file if it does not exist (SQLite).
    #[serde(default = "default_create_if_missing")]
    pub create_if_missing: bool,
}

fn default_create_if_missing() -> bool {
    true
}

impl ConnectInfo {
    /// An in-memory SQLite database.
    pub fn sqlite_memory() -> Self {
        Self {
            backend: Backend::Sqlite,
            database: Some(":memory:".to_string()),
            create_if_missing: true,
        }
    }

    /// A file-backed SQLite database.
    pub fn sqlite_file(path: impl Into<String>) -> Self {
        Self {
            backend: Backend::Sqlite,
            database: Some(path.into()),
            create_if_missing: true,
        }
    }

    /// The scripted in-process backend.
    pub fn memory() -> Self {
        Self {
            backend: Backend::Memory,
            database: None,
            create_if_missing: true,
        }
    }

    /// Parses a connection URL.
    ///
    /// Formats: `sqlite::memory:`, `sqlite:path/to.db`, `memory:`.
    pub fn from_url(url_str: &str) -> Result<Self> {
        let url = Url::parse(url_str)
            .map_err(|e| MapperError::config(format!("Invalid connection URL: {e}")))?;

        let backend = Backend::parse(url.scheme()).ok_or_else(|| {
            MapperError::config(format!(
                "Invalid scheme '{}'. Expected 'sqlite' or 'memory'",
                url.scheme()
            ))
        })?;

        match backend {
            Backend::Sqlite => {
                let path = url.path().trim_start_matches("//");
                if path.is_empty() {
                    return Err(MapperError::config(
                        "SQLite URL is missing a database path".to_string(),
                    ));
                }
                Ok(Self {
                    backend,
                    database: Some(path.to_string()),
                    create_if_missing: true,
                })
            }
            Backend::Memory => Ok(Self::memory()),
        }
    }

    /// Builds connection info from the environment.
    ///
    /// Reads `SQLMAPPER_DATABASE_URL`, then `DATABASE_URL`.
    pub fn from_env() -> Result<Self> {
        for var in ENV_URL_VARS {
            if let Ok(value) = std::env::var(var) {
                return Self::from_url(&value);
            }
        }
        Err(MapperError::config(format!(
            "none of {} are set",
            ENV_URL_VARS.join(", ")
        )))
    }

    /// Converts the connection info back to a URL.
    pub fn to_url(&self) -> Result<String> {
        match self.backend {
            Backend::Sqlite => {
                let database = self.database.as_deref().ok_or_else(|| {
                    MapperError::config("Database path is required for sqlite".to_string())
                })?;
                Ok(format!("{}:{database}", self.backend.url_scheme()))
            }
            Backend::Memory => Ok(format!("{}:", self.backend.url_scheme())),
        }
    }

    /// Returns a short string describing the target for logs and UIs.
    pub fn display_string(&self) -> String {
        match self.backend {
            Backend::Sqlite => format!(
                "sqlite @ {}",
                self.database.as_deref().unwrap_or(":memory:")
            ),
            Backend::Memory => "memory".to_string(),
        }
    }
}

/// Named connection profiles.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Profiles {
    /// Named connections.
    #[serde(default)]
    pub connections: HashMap<String, ConnectInfo>,
}

impl Profiles {
    /// Returns the default profile file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sqlmapper")
            .join("profiles.toml")
    }

    /// Loads profiles from a TOML file. A missing file yields the default.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| MapperError::config(format!("Failed to read profile file: {e}")))?;

        toml::from_str(&content).map_err(|e| {
            MapperError::config(format!("Profile error in {}:\n  {}", path.display(), e))
        })
    }

    /// Gets a named connection, or the `default` connection if name is None.
    pub fn get(&self, name: Option<&str>) -> Option<&ConnectInfo> {
        self.connections.get(name.unwrap_or("default"))
    }
}
