//! tally-report library entry.
//!
//! Offline aggregation: each worker process writes its registry with a
//! `MetricsContext`; this crate merges those files into one registry and
//! renders the combined report. The binary (`main.rs`) is a thin wrapper so
//! integration tests can drive the same code.

pub mod aggregate;
pub mod cli;
