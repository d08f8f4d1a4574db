//! Snapshot data types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::probe::Probe;
use crate::store::{Entry, Hive};

/// Result of one successful probe execution.
///
/// Built once all entries are known and never modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub description: String,
    pub root: Hive,
    pub source_path: String,
    pub entries: Vec<Entry>,
    pub collected_at: DateTime<Utc>,
}

impl Snapshot {
    /// Capture `entries` read for `probe`, stamped with the current time.
    pub fn new(probe: &Probe, entries: Vec<Entry>) -> Self {
        Self {
            description: probe.description.clone(),
            root: probe.root,
            source_path: probe.path.clone(),
            entries,
            collected_at: Utc::now(),
        }
    }

    /// Remote representation of this snapshot.
    pub fn to_record(&self) -> SnapshotRecord {
        let values = self
            .entries
            .iter()
            .map(|entry| BTreeMap::from([(entry.name.clone(), entry.value.to_json())]))
            .collect();

        SnapshotRecord {
            description: self.description.clone(),
            sub_key: self.source_path.clone(),
            values,
            collected_at: self.collected_at,
        }
    }
}

/// Body pushed to the remote store.
///
/// `values` keeps one single-key map per entry so that the remote side
/// preserves enumeration order and tolerates duplicate names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub description: String,
    pub sub_key: String,
    pub values: Vec<BTreeMap<String, serde_json::Value>>,
    pub collected_at: DateTime<Utc>,
}
