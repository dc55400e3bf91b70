use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{MetricError, Result};
use crate::profiler::GroupBy;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    pub version: u32,

    /// Session destination. Collection is off when absent.
    #[serde(default)]
    pub output: Option<PathBuf>,

    #[serde(default)]
    pub memory_snapshots: SnapshotConfig,
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MetricError::InvalidConfig(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        if self
            .output
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            return Err(MetricError::InvalidConfig(
                "output must not be empty".into(),
            ));
        }

        self.memory_snapshots.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotConfig {
    /// Caller opt-in; snapshots stay off unless set.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub group_by: GroupBy,

    #[serde(default = "default_frame_depth")]
    pub frame_depth: usize,

    #[serde(default = "default_retain_count")]
    pub retain_count: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            group_by: GroupBy::default(),
            frame_depth: default_frame_depth(),
            retain_count: default_retain_count(),
        }
    }
}

impl SnapshotConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=128).contains(&self.frame_depth) {
            return Err(MetricError::InvalidConfig(
                "memory_snapshots.frame_depth must be between 1 and 128".into(),
            ));
        }
        if self.retain_count == 0 {
            return Err(MetricError::InvalidConfig(
                "memory_snapshots.retain_count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn default_frame_depth() -> usize {
    1
}
fn default_retain_count() -> usize {
    10
}
