//! Sink Layer
//!
//! The two destinations every snapshot is written to:
//!
//! - [`LocalLog`]: append-only text log, opened and closed per write
//! - [`RemoteSink`]: push-capable keyed store; [`RealtimeDbSink`] talks to a
//!   realtime-database REST endpoint
//! - [`RetryQueue`]: optional bounded parking area for failed pushes

mod error;
mod local;
mod remote;
mod retry;

pub use error::SinkError;
pub use local::LocalLog;
pub use remote::{RealtimeDbSink, RemoteSink};
pub use retry::{PendingPush, RetryQueue, RetryReport};
