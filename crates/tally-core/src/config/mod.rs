//! Instrumentation config loader (strict parsing).

pub mod schema;

use std::fs;
use std::path::Path;

use crate::error::{MetricError, Result};

pub use schema::{MetricsConfig, SnapshotConfig};

pub fn load_from_file(path: impl AsRef<Path>) -> Result<MetricsConfig> {
    let path = path.as_ref();
    let s = fs::read_to_string(path).map_err(|e| MetricError::io(path, e))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<MetricsConfig> {
    let cfg: MetricsConfig = serde_yaml::from_str(s)
        .map_err(|e| MetricError::InvalidConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
