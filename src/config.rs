//! Configuration module for hivewatch.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Sweep interval and local log location
//! - Remote store endpoint, credentials and push timeout
//! - Store backend (live registry or fixture file)
//! - Delivery mode (best effort or bounded retry queue)
//! - Optional health server and probe catalog override

mod app;
mod error;

pub use app::{
    AppConfig, DEFAULT_INTERVAL, DEFAULT_LOG_FILE, DEFAULT_PUSH_TIMEOUT, DeliveryConfig,
    DeliveryMode, MIN_INTERVAL, RemoteConfig, ServerConfig, StoreConfig, StoreKind, parse_interval,
};
pub use error::ConfigError;
