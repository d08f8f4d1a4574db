//! Snapshot Layer
//!
//! Turns one probe into one snapshot and hands it to both sinks.
//!
//! # Components
//!
//! - [`Snapshot`] / [`SnapshotRecord`]: the collected data and its remote form
//! - [`SnapshotBuilder`]: runs a probe against the store and both sinks
//! - [`format`]: the text lines written to the local log

mod builder;
pub mod format;
mod types;

pub use builder::{ProbeOutcome, SnapshotBuilder};
pub use types::{Snapshot, SnapshotRecord};
