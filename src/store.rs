//! Store Layer
//!
//! Read-only access to the hierarchical configuration store that probes
//! enumerate. The store itself is opaque: everything above this module only
//! sees [`StoreReader::enumerate`].
//!
//! # Backends
//!
//! - [`RegistryStore`]: the live Windows registry (Windows builds only)
//! - [`FixtureStore`]: an in-memory tree, optionally loaded from YAML

mod fixture;
#[cfg(windows)]
mod registry;
mod types;

pub use fixture::{FixtureError, FixtureStore};
#[cfg(windows)]
pub use registry::RegistryStore;
pub use types::{Entry, Hive, SourceError, StoreReader, Value, ValueType, normalize_path};
