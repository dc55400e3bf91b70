//! Encoding of metric records for session output and merge input.
//!
//! A file holds a sequence of records tagged by `kind`:
//!
//! ```yaml
//! - kind: counter
//!   name: builds
//!   total: 7
//! - kind: distribution
//!   name: latency
//!   count: 3
//!   sum: 6.0
//!   sum_of_squares: 14.0
//!   min: 1.0
//!   max: 3.0
//! ```
//!
//! Floats round-trip exactly in both formats. JSON has no spelling for
//! infinities or NaN, so encoding such a value to JSON fails instead of
//! writing a file that cannot be read back.

use std::fs;
use std::path::Path;

use crate::error::{MetricError, Result};
use crate::metric::Metric;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Yaml,
    Json,
}

impl Format {
    /// JSON for `*.json`, YAML for everything else.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Yaml,
        }
    }
}

pub fn encode(metrics: &[Metric], format: Format) -> Result<String> {
    match format {
        Format::Yaml => serde_yaml::to_string(metrics).map_err(|e| MetricError::Encode(e.to_string())),
        Format::Json => {
            if let Some((name, field)) = metrics
                .iter()
                .find_map(|m| non_finite_field(m).map(|field| (m.name(), field)))
            {
                return Err(MetricError::Encode(format!(
                    "{name}.{field} is not finite and has no JSON representation"
                )));
            }
            serde_json::to_string_pretty(metrics).map_err(|e| MetricError::Encode(e.to_string()))
        }
    }
}

fn non_finite_field(metric: &Metric) -> Option<&'static str> {
    let bad = |v: f64| !v.is_finite();
    match metric {
        Metric::Distribution(d) => [
            ("sum", Some(d.sum)),
            ("sum_of_squares", Some(d.sum_of_squares)),
            ("min", d.min),
            ("max", d.max),
        ]
        .into_iter()
        .find(|(_, v)| v.is_some_and(bad))
        .map(|(field, _)| field),
        Metric::StopWatch(w) => bad(w.total).then_some("total"),
        Metric::ReentrantStopWatch(w) => bad(w.accumulated).then_some("accumulated"),
        Metric::Counter(_) | Metric::MapCounter(_) | Metric::Snapshot(_) => None,
    }
}

pub fn decode(s: &str, format: Format) -> Result<Vec<Metric>> {
    match format {
        Format::Yaml => serde_yaml::from_str(s).map_err(|e| MetricError::Decode(e.to_string())),
        Format::Json => serde_json::from_str(s).map_err(|e| MetricError::Decode(e.to_string())),
    }
}

pub fn write_file(path: impl AsRef<Path>, metrics: &[Metric]) -> Result<()> {
    let path = path.as_ref();
    let body = encode(metrics, Format::from_path(path))?;
    fs::write(path, body).map_err(|e| MetricError::io(path, e))
}

pub fn read_file(path: impl AsRef<Path>) -> Result<Vec<Metric>> {
    let path = path.as_ref();
    let body = fs::read_to_string(path).map_err(|e| MetricError::io(path, e))?;
    decode(&body, Format::from_path(path))
}
