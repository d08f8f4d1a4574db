//! Probe and category descriptors.

use serde::{Deserialize, Serialize};

use crate::store::Hive;

/// One subtree to snapshot and its remote destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    /// Namespace the subtree lives in.
    pub root: Hive,
    /// Subtree path within `root`.
    pub path: String,
    /// Label written to the local log header.
    pub description: String,
    /// Destination path in the remote store.
    pub remote_path: String,
}

impl Probe {
    pub fn new(
        root: Hive,
        path: impl Into<String>,
        description: impl Into<String>,
        remote_path: impl Into<String>,
    ) -> Self {
        Self {
            root,
            path: path.into(),
            description: description.into(),
            remote_path: remote_path.into(),
        }
    }
}

/// Ordered group of probes swept together under one banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeCategory {
    /// Stable identifier (e.g. `system_info`).
    pub name: String,
    /// Text of the `[Collecting ...]` banner line.
    pub banner: String,
    /// Probes in execution order.
    pub probes: Vec<Probe>,
}

impl ProbeCategory {
    pub fn new(name: impl Into<String>, banner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            banner: banner.into(),
            probes: Vec::new(),
        }
    }

    /// Append a probe.
    pub fn with_probe(mut self, probe: Probe) -> Self {
        self.probes.push(probe);
        self
    }
}
