//! Folding externally recorded metrics into the live registry.
//!
//! Worker processes write their registries with [`crate::MetricsContext`];
//! an aggregation step loads each file and merges it here. Every kind's
//! merge is commutative and associative, so the result does not depend on
//! the order files are merged in.

use std::path::Path;

use crate::codec::{self, Format};
use crate::error::{MetricError, Result};
use crate::metric::Metric;
use crate::registry;

/// What a successful merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Names that were absent and adopted wholesale.
    pub inserted: usize,
    /// Names folded into an existing metric.
    pub merged: usize,
}

/// Merge a batch of records into the registry.
///
/// A record whose name is registered under a different kind leaves that
/// entry untouched; the rest of the batch is still applied and all
/// rejected entries are returned together as
/// [`MetricError::MergeTypeMismatch`].
pub fn merge_metrics(metrics: impl IntoIterator<Item = Metric>) -> Result<MergeReport> {
    let mut report = MergeReport::default();
    let mut rejected = Vec::new();

    for metric in metrics {
        let name = metric.name().to_string();
        match registry::lookup(&name) {
            None => {
                tracing::debug!(metric = %name, kind = %metric.kind(), "adopting metric");
                registry::adopt(metric);
                report.inserted += 1;
            }
            Some(slot) => match slot.merge(&name, &metric) {
                Ok(()) => {
                    tracing::debug!(metric = %name, kind = %metric.kind(), "merged metric");
                    report.merged += 1;
                }
                Err(MetricError::MergeTypeMismatch(list)) => {
                    for m in &list {
                        tracing::warn!(
                            metric = %m.name,
                            existing = %m.existing,
                            incoming = %m.incoming,
                            "merge rejected"
                        );
                    }
                    rejected.extend(list);
                }
                Err(e) => return Err(e),
            },
        }
    }

    if rejected.is_empty() {
        Ok(report)
    } else {
        Err(MetricError::MergeTypeMismatch(rejected))
    }
}

/// Decode `s` and merge it.
pub fn merge_from_str(s: &str, format: Format) -> Result<MergeReport> {
    merge_metrics(codec::decode(s, format)?)
}

/// Decode a session file and merge it. Format follows the extension.
pub fn merge_from_file(path: impl AsRef<Path>) -> Result<MergeReport> {
    merge_metrics(codec::read_file(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::{Counter, MapCounter};
    use crate::distribution::Distribution;
    use crate::metric::MetricKind;
    use crate::testing;

    #[test]
    fn absent_names_are_adopted() {
        testing::reset(true);
        let yaml = "- kind: counter\n  name: remote_hits\n  total: 9\n";
        let report = merge_from_str(yaml, Format::Yaml).unwrap();
        assert_eq!(report, MergeReport { inserted: 1, merged: 0 });

        let c = Counter::get_or_create("remote_hits").unwrap();
        assert_eq!(c.total(), 9);
        c.inc().unwrap();
        assert_eq!(c.total(), 10);
    }

    #[test]
    fn existing_names_are_folded() {
        testing::reset(true);
        let c = Counter::new("builds").unwrap();
        c.inc_by(5).unwrap();
        let m = MapCounter::new("ops").unwrap();
        m.inc_by("b", 1).unwrap();
        m.inc_by("c", 4).unwrap();

        let yaml = r#"
- kind: counter
  name: builds
  total: 7
- kind: map_counter
  name: ops
  counts: { a: 2, b: 3 }
  total: 5
"#;
        let report = merge_from_str(yaml, Format::Yaml).unwrap();
        assert_eq!(report, MergeReport { inserted: 0, merged: 2 });
        assert_eq!(c.total(), 12);
        assert_eq!(m.summary(), "10 {a=2, b=4, c=4}");
    }

    #[test]
    fn merge_is_not_gated_by_collection_flag() {
        testing::reset(false);
        let c = Counter::new("offline").unwrap();
        merge_from_str("- kind: counter\n  name: offline\n  total: 3\n", Format::Yaml).unwrap();
        assert_eq!(c.total(), 3);
    }

    #[test]
    fn mismatch_rejects_entry_but_applies_rest() {
        testing::reset(true);
        let m = MapCounter::new("ops").unwrap();
        m.inc_by("k", 2).unwrap();
        let d = Distribution::new("latency").unwrap();
        d.add(1.0);

        let yaml = r#"
- kind: counter
  name: ops
  total: 100
- kind: distribution
  name: latency
  count: 1
  sum: 5.0
  sum_of_squares: 25.0
  min: 5.0
  max: 5.0
- kind: counter
  name: fresh
  total: 1
"#;
        let err = merge_from_str(yaml, Format::Yaml).unwrap_err();
        match err {
            MetricError::MergeTypeMismatch(list) => {
                assert_eq!(list.len(), 1);
                assert_eq!(list[0].name, "ops");
                assert_eq!(list[0].existing, MetricKind::MapCounter);
                assert_eq!(list[0].incoming, MetricKind::Counter);
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(m.summary(), "2 {k=2}");
        assert_eq!(d.count(), 2);
        assert_eq!(d.max(), Some(5.0));
        assert_eq!(Counter::get_or_create("fresh").unwrap().total(), 1);
    }

    #[test]
    fn decode_failure_leaves_registry_untouched() {
        testing::reset(true);
        let err = merge_from_str("- kind: counter\n  total: 1\n", Format::Yaml).unwrap_err();
        assert_eq!(err.code().as_str(), "DECODE");
        assert!(registry::is_empty());
    }
}
