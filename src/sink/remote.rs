//! Remote push sink.
//!
//! Pushes snapshot records into a hierarchical realtime database over its
//! REST interface: `POST {database_url}/{path}.json` creates a new child
//! under `path` and answers `{"name": "<generated key>"}`.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio::time::timeout;
use url::Url;

use super::SinkError;
use crate::config::RemoteConfig;
use crate::snapshot::SnapshotRecord;

/// Longest response body kept in a `Rejected` error.
const MAX_ERROR_BODY: usize = 256;

/// Push-capable keyed store.
///
/// `push` appends `record` as a new child under `path`. The store picks the
/// key; callers never supply one. A push is attempted exactly once.
#[async_trait::async_trait]
pub trait RemoteSink: Send + Sync + 'static {
    /// Human-readable endpoint, for diagnostics.
    fn endpoint(&self) -> &str;

    /// Append `record` under `path` and return the generated key.
    async fn push(&self, path: &str, record: &SnapshotRecord) -> Result<String, SinkError>;
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

/// REST client for a realtime-database endpoint.
#[derive(Debug, Clone)]
pub struct RealtimeDbSink {
    client: Client,
    base_url: Url,
    auth_token: Option<String>,
    timeout: Duration,
}

impl RealtimeDbSink {
    /// Validate the remote configuration and build the HTTP client.
    ///
    /// Nothing is sent over the network here.
    ///
    /// # Errors
    /// Returns `SinkError::Connect` if the URL is unusable, the credentials
    /// file is not configured, unreadable or not a JSON object, or the client
    /// cannot be built.
    pub fn connect(config: &RemoteConfig) -> Result<Self, SinkError> {
        let mut base_url = Url::parse(&config.database_url).map_err(|e| {
            SinkError::Connect(format!("invalid database url '{}': {e}", config.database_url))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(SinkError::Connect(format!(
                "database url '{}' must use http or https",
                config.database_url
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let credentials = config.credentials.as_deref().ok_or_else(|| {
            SinkError::Connect("remote credentials file is not configured".to_string())
        })?;
        let database_secret = read_credentials(credentials)?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SinkError::Connect(format!("failed to build HTTP client: {e}")))?;

        tracing::info!(endpoint = %base_url, timeout = ?config.timeout, "Remote sink ready");

        Ok(Self {
            client,
            base_url,
            auth_token: config.auth_token().or(database_secret),
            timeout: config.timeout,
        })
    }

    /// REST URL for a remote path.
    pub fn url_for(&self, path: &str) -> Result<Url, SinkError> {
        let relative = format!("{}.json", path.trim_matches('/'));
        self.base_url.join(&relative).map_err(|e| SinkError::Push {
            path: path.to_string(),
            reason: format!("invalid remote path: {e}"),
        })
    }
}

/// Check the service account file and pull out its `database_secret`, if any.
fn read_credentials(path: &Path) -> Result<Option<String>, SinkError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        SinkError::Connect(format!("cannot read credentials '{}': {e}", path.display()))
    })?;
    let parsed: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
        SinkError::Connect(format!(
            "credentials '{}' are not valid JSON: {e}",
            path.display()
        ))
    })?;
    let fields = parsed.as_object().ok_or_else(|| {
        SinkError::Connect(format!(
            "credentials '{}' must be a JSON object",
            path.display()
        ))
    })?;

    Ok(fields
        .get("database_secret")
        .and_then(serde_json::Value::as_str)
        .filter(|secret| !secret.is_empty())
        .map(str::to_string))
}

#[async_trait::async_trait]
impl RemoteSink for RealtimeDbSink {
    fn endpoint(&self) -> &str {
        self.base_url.as_str()
    }

    async fn push(&self, path: &str, record: &SnapshotRecord) -> Result<String, SinkError> {
        let url = self.url_for(path)?;
        let mut request = self.client.post(url).json(record);
        if let Some(ref token) = self.auth_token {
            request = request.query(&[("auth", token)]);
        }

        let transport_error = |e: reqwest::Error| {
            if e.is_timeout() {
                SinkError::Timeout {
                    path: path.to_string(),
                    timeout: self.timeout,
                }
            } else {
                SinkError::Push {
                    path: path.to_string(),
                    reason: e.to_string(),
                }
            }
        };

        let response = timeout(self.timeout, request.send())
            .await
            .map_err(|_| SinkError::Timeout {
                path: path.to_string(),
                timeout: self.timeout,
            })?
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| body.is_char_boundary(*i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(SinkError::Rejected {
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: PushResponse = response.json().await.map_err(|e| SinkError::Push {
            path: path.to_string(),
            reason: format!("unexpected response: {e}"),
        })?;
        Ok(parsed.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote_config_with(url: &str, credentials: &str) -> (RemoteConfig, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        std::fs::write(&path, credentials).unwrap();
        let config = RemoteConfig {
            database_url: url.to_string(),
            credentials: Some(path),
            auth_token: None,
            timeout: Duration::from_secs(5),
        };
        (config, dir)
    }

    fn remote_config(url: &str) -> (RemoteConfig, tempfile::TempDir) {
        remote_config_with(url, r#"{"type": "service_account", "project_id": "demo"}"#)
    }

    fn record() -> SnapshotRecord {
        SnapshotRecord {
            description: "Startup Programs".to_string(),
            sub_key: "Run".to_string(),
            values: Vec::new(),
            collected_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_url_for_paths() {
        let (config, _dir) = remote_config("https://demo.firebaseio.com");
        let sink = RealtimeDbSink::connect(&config).unwrap();
        assert_eq!(
            sink.url_for("/startup_programs/current_user")
                .unwrap()
                .as_str(),
            "https://demo.firebaseio.com/startup_programs/current_user.json"
        );
        assert_eq!(
            sink.url_for("/recent_files/").unwrap().as_str(),
            "https://demo.firebaseio.com/recent_files.json"
        );
    }

    #[test]
    fn test_url_for_keeps_base_path() {
        let (config, _dir) = remote_config("http://127.0.0.1:9000/db");
        let sink = RealtimeDbSink::connect(&config).unwrap();
        assert_eq!(
            sink.url_for("/x").unwrap().as_str(),
            "http://127.0.0.1:9000/db/x.json"
        );
    }

    #[test]
    fn test_connect_rejects_bad_scheme() {
        let (config, _dir) = remote_config("ftp://example.com");
        let err = RealtimeDbSink::connect(&config).unwrap_err();
        assert!(matches!(err, SinkError::Connect(_)));
    }

    #[test]
    fn test_connect_requires_credentials() {
        let (mut config, _dir) = remote_config("https://demo.firebaseio.com");
        config.credentials = None;

        let err = RealtimeDbSink::connect(&config).unwrap_err();
        assert!(matches!(err, SinkError::Connect(_)));
        assert!(err.to_string().contains("credentials file is not configured"));
    }

    #[test]
    fn test_connect_rejects_unreadable_credentials() {
        let (mut config, dir) = remote_config("https://demo.firebaseio.com");
        config.credentials = Some(dir.path().join("missing.json"));

        let err = RealtimeDbSink::connect(&config).unwrap_err();
        assert!(err.to_string().contains("cannot read credentials"));
    }

    #[test]
    fn test_connect_rejects_non_object_credentials() {
        let (config, _dir) = remote_config_with("https://demo.firebaseio.com", "[1, 2]");
        let err = RealtimeDbSink::connect(&config).unwrap_err();
        assert!(err.to_string().contains("must be a JSON object"));

        let (config, _dir) = remote_config_with("https://demo.firebaseio.com", "{not json");
        let err = RealtimeDbSink::connect(&config).unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn test_connect_accepts_valid_credentials() {
        let (config, _dir) = remote_config("https://demo.firebaseio.com/");
        let sink = RealtimeDbSink::connect(&config).unwrap();
        assert_eq!(sink.endpoint(), "https://demo.firebaseio.com/");
        assert_eq!(sink.auth_token, None);
    }

    #[test]
    fn test_database_secret_becomes_auth_token() {
        let (mut config, _dir) = remote_config_with(
            "https://demo.firebaseio.com/",
            r#"{"project_id": "demo", "database_secret": "legacy-secret"}"#,
        );
        let sink = RealtimeDbSink::connect(&config).unwrap();
        assert_eq!(sink.auth_token.as_deref(), Some("legacy-secret"));

        config.auth_token = Some("explicit".to_string());
        let sink = RealtimeDbSink::connect(&config).unwrap();
        assert_eq!(sink.auth_token.as_deref(), Some("explicit"));
    }

    #[tokio::test]
    async fn test_push_times_out_on_silent_endpoint() {
        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let (mut config, _dir) = remote_config(&format!("http://{addr}/"));
        config.timeout = Duration::from_millis(500);
        let sink = RealtimeDbSink::connect(&config).unwrap();

        let started = std::time::Instant::now();
        let err = sink.push("/x", &record()).await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, SinkError::Timeout { ref path, .. } if path == "/x"));
        assert!(elapsed >= Duration::from_millis(450));
        assert!(elapsed < Duration::from_secs(5));
    }
}
