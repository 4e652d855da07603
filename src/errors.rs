use std::io;
use std::path::PathBuf;
use nvml_wrapper::error::NvmlError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Cannot read config {path}: {source}")]
    ConfigRead { path: PathBuf, source: io::Error },
    #[error("Invalid config {path}: {source}")]
    ConfigParse { path: PathBuf, source: toml::de::Error },
    #[error("Invalid alias {0:?}, expected <worker>=<process>")]
    InvalidAlias(String),
    #[error("Invalid sampling interval {0}s")]
    InvalidInterval(f64),
    #[error("Accelerator query failed: {0}")]
    Accelerator(#[from] NvmlError),
    #[error("Cannot install signal handler: {0}")]
    Signal(io::Error),
    #[error("Output error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
