//! Merge input files into the process registry.

use std::path::{Path, PathBuf};

use tally_core::codec;
use tally_core::error::{MetricError, Result};
use tally_core::merge::{self, MergeReport};
use tally_core::registry;

/// Result of merging a list of files.
#[derive(Debug, Default)]
pub struct Aggregate {
    /// Files merged without error.
    pub merged_files: usize,
    /// Per-file totals over the successful files.
    pub totals: MergeReport,
    /// Files that failed, with the reason. Entries of a file that were not
    /// rejected are still merged.
    pub failures: Vec<(PathBuf, MetricError)>,
}

impl Aggregate {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Merge every input in order. A failing file does not stop the others.
pub fn merge_files(inputs: &[PathBuf]) -> Aggregate {
    let mut out = Aggregate::default();
    for path in inputs {
        match merge::merge_from_file(path) {
            Ok(r) => {
                tracing::info!(
                    path = %path.display(),
                    inserted = r.inserted,
                    merged = r.merged,
                    "merged metrics file"
                );
                out.merged_files += 1;
                out.totals.inserted += r.inserted;
                out.totals.merged += r.merged;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), code = e.code().as_str(), "merge failed");
                out.failures.push((path.clone(), e));
            }
        }
    }
    out
}

/// Write the current registry, e.g. to merge again later.
pub fn write_merged(path: &Path) -> Result<()> {
    codec::write_file(path, &registry::metrics())
}

/// One failure line for stderr.
pub fn describe_failure(path: &Path, err: &MetricError) -> String {
    format!("error[{}]: {}: {}", err.code().as_str(), path.display(), err)
}
