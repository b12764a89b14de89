//! Binding configuration.

use std::num::ParseIntError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Logical name of the native library.
pub const DEFAULT_LIBRARY: &str = "tracker-sparql-1.0";

/// Priority forwarded with updates unless overridden (`G_PRIORITY_HIGH`).
pub const DEFAULT_UPDATE_PRIORITY: i32 = -100;

/// Environment variable overriding [`TrackerConfig::library`].
pub const LIBRARY_ENV: &str = "TRACKER_SPARQL_LIBRARY";

/// Environment variable overriding [`TrackerConfig::update_priority`].
pub const UPDATE_PRIORITY_ENV: &str = "TRACKER_SPARQL_UPDATE_PRIORITY";

/// How the native library is located and how updates are submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Logical library name (`tracker-sparql-1.0`) or a path to the shared object.
    pub library: String,
    /// Priority passed to `tracker_sparql_connection_update`.
    pub update_priority: i32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            library: DEFAULT_LIBRARY.to_owned(),
            update_priority: DEFAULT_UPDATE_PRIORITY,
        }
    }
}

impl TrackerConfig {
    /// Defaults overridden by [`LIBRARY_ENV`] and [`UPDATE_PRIORITY_ENV`].
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidVar`] if the priority is not an integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidVar`] if the priority is not an integer.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(library) = lookup(LIBRARY_ENV).filter(|v| !v.trim().is_empty()) {
            config.library = library;
        }
        if let Some(value) = lookup(UPDATE_PRIORITY_ENV) {
            config.update_priority =
                value
                    .trim()
                    .parse()
                    .map_err(|source| ConfigError::InvalidVar {
                        var: UPDATE_PRIORITY_ENV,
                        value,
                        source,
                    })?;
        }
        Ok(config)
    }
}

/// Invalid configuration input.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable holds an unparsable value.
    #[error("invalid value `{value}` for {var}")]
    InvalidVar {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
        /// Parse failure.
        #[source]
        source: ParseIntError,
    },
}
