//! Hivewatch - Registry Snapshot Agent
//!
//! Periodically reads a fixed catalog of registry subtrees, appends a
//! human-readable record of each to a local log and pushes a structured copy
//! to a remote realtime database. A probe that fails is logged and skipped;
//! it never stops the sweep.
//!
//! # Architecture
//!
//! - **Store**: read-only enumeration of the live registry or a fixture
//! - **Probe**: the catalog of subtrees to read, grouped into categories
//! - **Snapshot**: per-probe execution against the store and both sinks
//! - **Sink**: append-only local log, remote push and optional retry queue
//! - **Scheduler**: the sweep loop with cooperative shutdown
//! - **Server**: optional `/healthz` and `/status` endpoints
//!
//! # Example
//!
//! ```rust,ignore
//! use hivewatch::{AppConfig, agent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load("configs/agent.yaml")?;
//!     let scheduler = agent::start(&config)?;
//!     let (_tx, rx) = tokio::sync::watch::channel(false);
//!     scheduler.run(rx).await;
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod config;
pub mod probe;
pub mod scheduler;
pub mod server;
pub mod sink;
pub mod snapshot;
pub mod store;

pub use agent::AgentError;
pub use config::{AppConfig, ConfigError};
pub use probe::{Probe, ProbeCatalog, ProbeCategory};
pub use scheduler::{AgentStatus, SchedulerState, StatusHandle, SweepReport, SweepScheduler};
pub use sink::{LocalLog, RealtimeDbSink, RemoteSink, SinkError};
pub use snapshot::{ProbeOutcome, Snapshot, SnapshotBuilder, SnapshotRecord};
pub use store::{Entry, FixtureStore, Hive, SourceError, StoreReader, Value, ValueType};
