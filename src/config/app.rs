//! Application configuration structures.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::probe::ProbeCatalog;

// =============================================================================
// Constants
// =============================================================================

/// Default pause between sweeps (6 hours).
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

/// Minimum pause between sweeps (1 second).
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Default push timeout (10 seconds).
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default local log location.
pub const DEFAULT_LOG_FILE: &str = "forensic_output/forensic_registry_data.txt";

/// Default retry queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Default total attempts per push in retry mode.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Parse a sweep interval such as `30s`, `6h` or `1h30m`.
///
/// # Examples
///
/// ```
/// use hivewatch::config::parse_interval;
///
/// assert_eq!(parse_interval("6h").unwrap().as_secs(), 21_600);
/// assert!(parse_interval("500ms").is_err());
/// ```
pub fn parse_interval(value: &str) -> Result<Duration, ConfigError> {
    let interval = humantime::parse_duration(value.trim()).map_err(|e| ConfigError::Interval {
        value: value.to_string(),
        reason: e.to_string(),
    })?;
    if interval < MIN_INTERVAL {
        return Err(ConfigError::Interval {
            value: value.to_string(),
            reason: format!("must be at least {}", humantime::format_duration(MIN_INTERVAL)),
        });
    }
    Ok(interval)
}

/// Resolve an auth token that is either a literal or a single
/// `${VAR}` / `${VAR:-default}` reference. Blank tokens resolve to `None`.
fn resolve_token(raw: &str) -> Option<String> {
    static TOKEN_REF: OnceLock<Regex> = OnceLock::new();

    let pattern = TOKEN_REF.get_or_init(|| {
        Regex::new(r"^\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-(.*))?\}$")
            .expect("token reference pattern is valid")
    });

    let raw = raw.trim();
    let token = match pattern.captures(raw) {
        Some(caps) => std::env::var(&caps[1])
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| caps.get(2).map(|m| m.as_str().to_string()))
            .unwrap_or_default(),
        None => raw.to_string(),
    };
    (!token.is_empty()).then_some(token)
}

fn default_interval() -> Duration {
    DEFAULT_INTERVAL
}

fn default_log_file() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_FILE)
}

fn default_push_timeout() -> Duration {
    DEFAULT_PUSH_TIMEOUT
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

// =============================================================================
// Remote Configuration
// =============================================================================

/// Remote store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the realtime database.
    pub database_url: String,

    /// Service account file. Required: startup fails when it is absent,
    /// unreadable or not a JSON object.
    #[serde(default)]
    pub credentials: Option<PathBuf>,

    /// Access token sent as `?auth=`, either literal or a `${VAR}` reference.
    /// Takes precedence over a `database_secret` in the credentials file.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Upper bound for a single push (default: 10s).
    #[serde(default = "default_push_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl RemoteConfig {
    /// Configured auth token, resolved against the environment.
    pub fn auth_token(&self) -> Option<String> {
        self.auth_token.as_deref().and_then(resolve_token)
    }
}

// =============================================================================
// Store Configuration
// =============================================================================

/// Which store backend probes read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// The live Windows registry.
    #[default]
    Registry,
    /// A YAML fixture file.
    Fixture,
}

/// Store backend settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,

    /// Fixture file, required when `kind` is `fixture`.
    #[serde(default)]
    pub fixture: Option<PathBuf>,
}

// =============================================================================
// Delivery Configuration
// =============================================================================

/// What happens to a push that fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Report and discard.
    #[default]
    BestEffort,
    /// Park in a bounded queue and retry on later sweeps.
    RetryQueue,
}

/// Push delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default)]
    pub mode: DeliveryMode,

    /// Maximum parked pushes (default: 64).
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Total attempts per push, including the first (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::BestEffort,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

// =============================================================================
// Server Configuration
// =============================================================================

/// Health server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (default: "127.0.0.1").
    pub bind: String,

    /// Port (default: 9300).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 9300,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Pause between sweeps (default: 6h, minimum: 1s).
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Append-only local log file.
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// Remote store settings.
    pub remote: RemoteConfig,

    /// Store backend settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Push delivery settings.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Health server; disabled when absent.
    #[serde(default)]
    pub server: Option<ServerConfig>,

    /// Probe catalog override; the built-in catalog is used when absent.
    #[serde(default)]
    pub categories: Option<ProbeCatalog>,
}

impl AppConfig {
    /// Configuration with defaults everywhere except the remote endpoint.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            log_file: default_log_file(),
            remote: RemoteConfig {
                database_url: database_url.into(),
                credentials: None,
                auth_token: None,
                timeout: DEFAULT_PUSH_TIMEOUT,
            },
            store: StoreConfig::default(),
            delivery: DeliveryConfig::default(),
            server: None,
            categories: None,
        }
    }

    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// The probe table to sweep.
    pub fn catalog(&self) -> ProbeCatalog {
        self.categories.clone().unwrap_or_default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval < MIN_INTERVAL {
            return Err(ConfigError::Invalid(format!(
                "interval must be at least {:?}",
                MIN_INTERVAL
            )));
        }

        if self.log_file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "log_file cannot be empty".to_string(),
            ));
        }

        // Validate remote endpoint
        let url = url::Url::parse(&self.remote.database_url).map_err(|e| {
            ConfigError::Invalid(format!(
                "invalid remote database_url '{}': {}",
                self.remote.database_url, e
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "remote database_url '{}' must use http or https",
                self.remote.database_url
            )));
        }
        if self.remote.timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "remote timeout must be positive".to_string(),
            ));
        }

        // Validate store backend
        if self.store.kind == StoreKind::Fixture && self.store.fixture.is_none() {
            return Err(ConfigError::Invalid(
                "store kind 'fixture' requires a fixture path".to_string(),
            ));
        }

        // Validate delivery
        if self.delivery.mode == DeliveryMode::RetryQueue {
            if self.delivery.queue_capacity == 0 {
                return Err(ConfigError::Invalid(
                    "delivery queue_capacity must be positive".to_string(),
                ));
            }
            if self.delivery.max_attempts == 0 {
                return Err(ConfigError::Invalid(
                    "delivery max_attempts must be positive".to_string(),
                ));
            }
        }

        // Validate health server
        if let Some(ref server) = self.server {
            server.bind.parse::<IpAddr>().map_err(|_| {
                ConfigError::Invalid(format!(
                    "invalid server bind address: '{}'",
                    server.bind
                ))
            })?;
            if server.port == 0 {
                return Err(ConfigError::Invalid(
                    "server port must be non-zero".to_string(),
                ));
            }
        }

        // Validate probes
        self.catalog().validate()?;

        Ok(())
    }
}
