//! Enum option types used by [`crate::BridgeConfig`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Log level for debug logging to file.
///
/// Controls the verbosity of log output written to the debug log file.
/// The `RUST_LOG` environment variable takes precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// No logging (log file not created)
    #[default]
    Off,
    /// Errors only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
    /// Most verbose
    Trace,
}

impl LogLevel {
    /// Convert to `log::LevelFilter`
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Sort key for the profile report printed after the UI loop exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProfileSort {
    /// Most frequently invoked redraw operations first
    Calls,
    /// Operations with the largest cumulative handler time first
    #[default]
    Cumulative,
    /// Alphabetical by operation name
    Name,
}

impl ProfileSort {
    /// Canonical lowercase name, as accepted by [`FromStr`] and serde.
    pub fn as_str(self) -> &'static str {
        match self {
            ProfileSort::Calls => "calls",
            ProfileSort::Cumulative => "cumulative",
            ProfileSort::Name => "name",
        }
    }
}

impl fmt::Display for ProfileSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileSort {
    type Err = String;

    /// Accepts the canonical names plus the short aliases `ncalls`,
    /// `cumtime`, `time` and `tottime`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "calls" | "ncalls" => Ok(ProfileSort::Calls),
            "cumulative" | "cumtime" | "time" | "tottime" => Ok(ProfileSort::Cumulative),
            "name" => Ok(ProfileSort::Name),
            other => Err(format!("unknown profile sort key '{other}'")),
        }
    }
}

/// What to do with a redraw update whose operation has no registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnknownOpPolicy {
    /// Treat it as a handler failure: stop the notification, record the
    /// error and ask the editor to quit.
    #[default]
    Fail,
    /// Log the operation name and continue with the next update.
    Skip,
}
