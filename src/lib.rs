//! Per-worker CPU and GPU usage, aggregated over each worker's process subtree.

pub mod collectors;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod mode;
pub mod registry;
pub mod render;
pub mod resolver;
pub mod session;
pub mod shutdown;
