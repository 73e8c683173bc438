//! Configuration file support.
//!
//! ```toml
//! [connection]
//! connection_string = "DSN=Demodata"
//!
//! [collections.user]
//! table_name = "USERS"
//!
//! [collections.user.attributes.id]
//! type = "integer"
//! primary_key = true
//! ```

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{PervasiveError, PervasiveResult};
use crate::schema::{Collection, Registry};

/// Environment variable overriding the configured connection string.
pub const CONNECTION_STRING_ENV: &str = "PERVASQL_CONNECTION_STRING";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Collection identity → definition, in file order.
    #[serde(default)]
    pub collections: IndexMap<String, Collection>,
}

/// Connection settings handed to the execution service.
///
/// The compiler never opens a connection itself; `connection_string` is
/// passed through to whatever [`crate::engine::Executor`] the caller builds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default, alias = "connectionString")]
    pub connection_string: Option<String>,
}

/// ODBC keys whose values are never echoed.
const SECRET_KEYS: &[&str] = &["pwd", "password"];

impl ConnectionConfig {
    /// The connection string with password values masked, for display.
    pub fn redacted(&self) -> Option<String> {
        let conn = self.connection_string.as_deref()?;
        let parts: Vec<String> = conn
            .split(';')
            .map(|part| match part.split_once('=') {
                Some((key, _)) if is_secret(key) => format!("{key}=***"),
                _ => part.to_string(),
            })
            .collect();
        Some(parts.join(";"))
    }
}

fn is_secret(key: &str) -> bool {
    let key = key.trim().to_ascii_lowercase();
    SECRET_KEYS.contains(&key.as_str())
}

impl Config {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> PervasiveResult<Self> {
        let mut config: Config =
            toml::from_str(text).map_err(|e| PervasiveError::Config(e.to_string()))?;

        // The table key is the identity unless the entry names one itself
        for (identity, collection) in config.collections.iter_mut() {
            if collection.identity.is_empty() {
                collection.identity = identity.clone();
            }
        }
        Ok(config)
    }

    /// Load from `path`, or from the default location when `path` is `None`.
    ///
    /// A missing default file yields an empty configuration; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> PervasiveResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_str(&std::fs::read_to_string(path)?)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => {
                    Self::from_toml_str(&std::fs::read_to_string(&path)?)?
                }
                _ => Self::default(),
            },
        };

        if let Ok(conn) = std::env::var(CONNECTION_STRING_ENV) {
            config.connection.connection_string = Some(conn);
        }
        Ok(config)
    }

    /// `<config dir>/pervasql/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pervasql").join("config.toml"))
    }

    /// Build a registry from the configured collections.
    pub fn registry(&self) -> Registry {
        self.collections.values().cloned().collect()
    }
}
