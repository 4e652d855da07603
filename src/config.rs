//! Optional TOML configuration file.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use log::warn;
use crate::errors::MonitorError;

pub const DEFAULT_INTERVAL: f64 = 1.0;
pub const MIN_INTERVAL: f64 = 0.1;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub interval_seconds: Option<f64>,
    pub registry_command: Option<Vec<String>>,
    /// Logical worker name (without leading '/') to the string searched in
    /// process command lines.
    pub aliases: HashMap<String, String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, MonitorError> {
        let content = fs::read_to_string(path).map_err(|source| MonitorError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| MonitorError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Parses a `worker=process` command-line alias.
pub fn parse_alias(raw: &str) -> Result<(String, String), MonitorError> {
    match raw.split_once('=') {
        Some((worker, process)) if !worker.trim().is_empty() && !process.trim().is_empty() => Ok((
            worker.trim().trim_start_matches('/').to_string(),
            process.trim().to_string(),
        )),
        _ => Err(MonitorError::InvalidAlias(raw.to_string())),
    }
}

/// Turns the configured interval into a sleep period. Values under
/// [`MIN_INTERVAL`] are raised to it; values no `Duration` can hold are rejected.
pub fn sampling_period(seconds: f64) -> Result<Duration, MonitorError> {
    let seconds = if seconds >= MIN_INTERVAL {
        seconds
    } else {
        warn!("Interval {}s is too short, using {}s", seconds, MIN_INTERVAL);
        MIN_INTERVAL
    };
    Duration::try_from_secs_f64(seconds).map_err(|_| MonitorError::InvalidInterval(seconds))
}
