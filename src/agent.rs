//! Agent assembly.
//!
//! Wires configuration into a ready-to-run [`SweepScheduler`]. The remote
//! connection is established first: if it fails, startup aborts before the
//! local log is touched and no sweep ever runs.

use std::sync::Arc;

use thiserror::Error;

use crate::config::{AppConfig, ConfigError, DeliveryMode, StoreConfig, StoreKind};
use crate::scheduler::SweepScheduler;
use crate::sink::{LocalLog, RealtimeDbSink, RemoteSink, RetryQueue, SinkError};
use crate::snapshot::{SnapshotBuilder, format};
use crate::store::{FixtureError, FixtureStore, StoreReader};

/// Fatal agent errors.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("remote store unavailable: {0}")]
    Remote(#[from] SinkError),

    #[error("failed to open fixture store: {0}")]
    Fixture(#[from] FixtureError),

    #[error("store backend unavailable: {0}")]
    Store(String),
}

/// Connect to the remote store, open the store backend and assemble the
/// scheduler.
///
/// # Errors
/// Any error here is fatal; the caller should exit without sweeping.
pub fn start(config: &AppConfig) -> Result<SweepScheduler, AgentError> {
    config.validate()?;

    let remote = RealtimeDbSink::connect(&config.remote)?;
    let reader = open_store(&config.store)?;

    Ok(build_scheduler(config, reader, Arc::new(remote)))
}

/// Open the configured store backend.
///
/// # Errors
/// Returns `AgentError::Fixture` for unreadable fixtures and
/// `AgentError::Store` when the live registry is not available on this
/// platform.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn StoreReader>, AgentError> {
    match config.kind {
        StoreKind::Fixture => {
            let path = config
                .fixture
                .as_ref()
                .ok_or_else(|| AgentError::Store("fixture path is not set".to_string()))?;
            let store = FixtureStore::load(path)?;
            tracing::info!(path = %path.display(), keys = store.len(), "Fixture store loaded");
            Ok(Arc::new(store))
        }
        StoreKind::Registry => open_registry(),
    }
}

#[cfg(windows)]
fn open_registry() -> Result<Arc<dyn StoreReader>, AgentError> {
    Ok(Arc::new(crate::store::RegistryStore::new()))
}

#[cfg(not(windows))]
fn open_registry() -> Result<Arc<dyn StoreReader>, AgentError> {
    Err(AgentError::Store(
        "the live registry is only available on Windows; set store.kind to 'fixture'".to_string(),
    ))
}

/// Assemble a scheduler from already-opened backends.
///
/// Writes the startup banner to the local log.
pub fn build_scheduler(
    config: &AppConfig,
    reader: Arc<dyn StoreReader>,
    remote: Arc<dyn RemoteSink>,
) -> SweepScheduler {
    let local = LocalLog::new(&config.log_file);
    let catalog = config.catalog();

    tracing::info!(
        store = reader.name(),
        remote = remote.endpoint(),
        log_file = %local.path().display(),
        categories = catalog.categories().len(),
        probes = catalog.probe_count(),
        "Agent starting"
    );

    let mut builder = SnapshotBuilder::new(reader, local, remote);
    if config.delivery.mode == DeliveryMode::RetryQueue {
        tracing::info!(
            capacity = config.delivery.queue_capacity,
            max_attempts = config.delivery.max_attempts,
            "Retry queue enabled"
        );
        builder = builder.with_retry_queue(RetryQueue::new(
            config.delivery.queue_capacity,
            config.delivery.max_attempts,
        ));
    }
    builder.record(&format::agent_started());

    SweepScheduler::new(catalog, builder, config.interval)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn config(dir: &tempfile::TempDir, url: &str) -> AppConfig {
        let credentials = dir.path().join("credentials.json");
        std::fs::write(&credentials, r#"{"type": "service_account"}"#).unwrap();

        let mut config = AppConfig::new(url);
        config.remote.credentials = Some(credentials);
        config.log_file = dir.path().join("out").join("log.txt");
        config.store = StoreConfig {
            kind: StoreKind::Fixture,
            fixture: Some(dir.path().join("fixture.yaml")),
        };
        config
    }

    fn write_fixture(dir: &tempfile::TempDir) {
        std::fs::write(
            dir.path().join("fixture.yaml"),
            "keys:\n  - root: HKCU\n    path: Software\\Microsoft\\Windows\\CurrentVersion\\Run\n    values: []\n",
        )
        .unwrap();
    }

    #[test]
    fn test_start_fails_on_bad_credentials_without_touching_log() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(&dir);
        let mut config = config(&dir, "https://demo.firebaseio.com/");
        config.remote.credentials = Some(PathBuf::from("/nonexistent/credentials.json"));

        let err = start(&config).unwrap_err();
        assert!(matches!(err, AgentError::Remote(SinkError::Connect(_))));
        assert!(!config.log_file.exists());
    }

    #[test]
    fn test_start_fails_without_credentials() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(&dir);
        let mut config = config(&dir, "https://demo.firebaseio.com/");
        config.remote.credentials = None;

        let err = start(&config).unwrap_err();
        assert!(matches!(err, AgentError::Remote(SinkError::Connect(_))));
        assert!(!config.log_file.exists());
    }

    #[test]
    fn test_start_fails_on_missing_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, "https://demo.firebaseio.com/");

        let err = start(&config).unwrap_err();
        assert!(matches!(err, AgentError::Fixture(_)));
    }

    #[test]
    fn test_start_writes_startup_banner() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(&dir);
        let config = config(&dir, "https://demo.firebaseio.com/");

        let scheduler = start(&config).unwrap();
        assert_eq!(scheduler.catalog().probe_count(), 10);

        let log = std::fs::read_to_string(&config.log_file).unwrap();
        assert_eq!(log, format!("{}\n", format::agent_started()));
    }

    #[test]
    fn test_shipped_configs_load() {
        let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
        for name in ["agent.yaml", "fixture.yaml"] {
            let config = AppConfig::load(root.join("configs").join(name)).unwrap();
            assert_eq!(config.catalog().probe_count(), 10);
        }

        let store = open_store(&StoreConfig {
            kind: StoreKind::Fixture,
            fixture: Some(root.join("fixtures").join("store.yaml")),
        })
        .unwrap();
        assert_eq!(store.name(), "fixture");
    }

    #[cfg(not(windows))]
    #[test]
    fn test_registry_unavailable_off_windows() {
        let err = open_store(&StoreConfig::default()).err().expect("expected open_store to fail");
        assert!(err.to_string().contains("fixture"));
    }
}
