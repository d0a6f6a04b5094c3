//! Store settings and diagnostic verbosity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How much of a write cycle the diagnostic trace includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// No diagnostic output.
    #[default]
    None,
    /// The applied changes and any recomputed values.
    Diff,
    /// Everything: previous state, changes, recomputed values, new state.
    All,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::None => "none",
            LogLevel::Diff => "diff",
            LogLevel::All => "all",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = ParseLogLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(LogLevel::None),
            "diff" => Ok(LogLevel::Diff),
            "all" => Ok(LogLevel::All),
            other => Err(ParseLogLevelError(other.to_string())),
        }
    }
}

/// Error returned when parsing a [`LogLevel`] from a string fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown log level `{0}`, expected one of `none`, `diff`, `all`")]
pub struct ParseLogLevelError(String);

/// Process-wide store settings, immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Label used in trace group headers.
    pub name: String,
    /// Diagnostic verbosity for write cycles.
    pub log_level: LogLevel,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: "MyStore".to_string(),
            log_level: LogLevel::None,
        }
    }
}
