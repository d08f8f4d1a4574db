//! Probe Layer
//!
//! Declarative descriptions of which subtrees to read and where each result
//! is pushed. Probes are grouped into ordered categories; the whole table is
//! a [`ProbeCatalog`] built once at startup and handed to the scheduler.

mod catalog;
mod types;

pub use catalog::ProbeCatalog;
pub use types::{Probe, ProbeCategory};
