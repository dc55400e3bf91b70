//! Session controller: switches collection on for a region of the program
//! and writes the registry out when the region ends.

use std::path::{Path, PathBuf};

use crate::codec;
use crate::config::MetricsConfig;
use crate::error::Result;
use crate::registry;

/// Scoped metrics session.
///
/// Entering saves the collection flag and turns collection on iff a
/// non-empty output path was given; an empty path counts as none. Leaving restores the saved flag and, with an output path,
/// writes every registered metric to it.
///
/// Call [`MetricsContext::finish`] to observe write errors. If the context is
/// dropped instead (early return, unwinding), the same exit runs and a
/// failure is logged.
#[must_use = "the session ends when the context is dropped"]
pub struct MetricsContext {
    output: Option<PathBuf>,
    previous: bool,
    finished: bool,
}

impl MetricsContext {
    pub fn enter(output: Option<impl Into<PathBuf>>) -> Self {
        let output = output
            .map(Into::into)
            .filter(|p: &PathBuf| !p.as_os_str().is_empty());
        let previous = registry::set_enabled(output.is_some());
        tracing::debug!(output = ?output, "metrics session started");
        Self {
            output,
            previous,
            finished: false,
        }
    }

    pub fn from_config(cfg: &MetricsConfig) -> Self {
        Self::enter(cfg.output.clone())
    }

    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    /// End the session and report whether the registry was written.
    pub fn finish(mut self) -> Result<()> {
        self.exit()
    }

    fn exit(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        registry::set_enabled(self.previous);

        let Some(path) = &self.output else { return Ok(()); };
        let metrics = registry::metrics();
        codec::write_file(path, &metrics)?;
        tracing::info!(path = %path.display(), metrics = metrics.len(), "metrics written");
        Ok(())
    }
}

impl Drop for MetricsContext {
    fn drop(&mut self) {
        if let Err(e) = self.exit() {
            tracing::error!(error = %e, "failed to write metrics");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use super::*;
    use crate::counter::Counter;
    use crate::testing;

    #[test]
    fn session_with_output_enables_and_writes() {
        testing::reset(false);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.yaml");

        let c = Counter::new("builds").unwrap();
        let ctx = MetricsContext::enter(Some(&path));
        assert!(registry::is_enabled());
        c.inc_by(7).unwrap();
        ctx.finish().unwrap();

        assert!(!registry::is_enabled());
        let written = codec::read_file(&path).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].to_string(), "builds: 7");
    }

    #[test]
    fn session_without_output_disables_collection() {
        testing::reset(true);
        let c = Counter::new("builds").unwrap();
        {
            let _ctx = MetricsContext::enter(None::<PathBuf>);
            assert!(!registry::is_enabled());
            c.inc().unwrap();
        }
        assert!(registry::is_enabled());
        assert_eq!(c.total(), 0);
    }

    #[test]
    fn empty_output_path_means_no_destination() {
        testing::reset(false);
        let c = Counter::new("builds").unwrap();
        let ctx = MetricsContext::enter(Some(""));
        assert!(ctx.output().is_none());
        assert!(!registry::is_enabled());
        c.inc().unwrap();
        ctx.finish().unwrap();
        assert_eq!(c.total(), 0);
    }

    #[test]
    fn session_flushes_on_panic() {
        testing::reset(false);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let c = Counter::new("attempts").unwrap();

        let res = catch_unwind(AssertUnwindSafe(|| {
            let _ctx = MetricsContext::enter(Some(&path));
            c.inc_by(2).unwrap();
            panic!("analysis crashed");
        }));
        assert!(res.is_err());
        assert!(!registry::is_enabled());
        assert_eq!(codec::read_file(&path).unwrap()[0].to_string(), "attempts: 2");
    }

    #[test]
    fn write_failure_is_reported_and_flag_restored() {
        testing::reset(false);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing_dir").join("metrics.yaml");
        let ctx = MetricsContext::enter(Some(path));
        let err = ctx.finish().unwrap_err();
        assert_eq!(err.code().as_str(), "IO");
        assert!(!registry::is_enabled());
    }

    #[test]
    fn from_config_uses_output() {
        testing::reset(false);
        let dir = tempfile::tempdir().unwrap();
        let yaml = format!("version: 1\noutput: {:?}\n", dir.path().join("m.yaml"));
        let cfg = crate::config::load_from_str(&yaml).unwrap();
        let ctx = MetricsContext::from_config(&cfg);
        assert!(registry::is_enabled());
        assert_eq!(ctx.output(), cfg.output.as_deref());
        ctx.finish().unwrap();
        assert!(dir.path().join("m.yaml").exists());
    }
}
