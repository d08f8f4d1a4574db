//! Core store types and the reader contract.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Errors reported by a [`StoreReader`].
///
/// Both variants are contained at the probe boundary; neither ever stops a
/// sweep.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The subtree does not exist under the requested root.
    #[error("path '{path}' not found")]
    NotFound { path: String },

    /// The subtree exists but cannot be read.
    #[error("cannot read '{path}': {reason}")]
    Access { path: String, reason: String },
}

impl SourceError {
    /// Build an access error from any displayable cause.
    pub fn access(path: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Access {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Top-level namespace of the store.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Hive {
    #[serde(rename = "HKLM", alias = "HKEY_LOCAL_MACHINE")]
    #[strum(to_string = "HKLM", serialize = "HKEY_LOCAL_MACHINE")]
    LocalMachine,
    #[serde(rename = "HKCU", alias = "HKEY_CURRENT_USER")]
    #[strum(to_string = "HKCU", serialize = "HKEY_CURRENT_USER")]
    CurrentUser,
    #[serde(rename = "HKU", alias = "HKEY_USERS")]
    #[strum(to_string = "HKU", serialize = "HKEY_USERS")]
    Users,
    #[serde(rename = "HKCR", alias = "HKEY_CLASSES_ROOT")]
    #[strum(to_string = "HKCR", serialize = "HKEY_CLASSES_ROOT")]
    ClassesRoot,
    #[serde(rename = "HKCC", alias = "HKEY_CURRENT_CONFIG")]
    #[strum(to_string = "HKCC", serialize = "HKEY_CURRENT_CONFIG")]
    CurrentConfig,
}

/// Encoding tag the store attached to a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[allow(non_camel_case_types)]
pub enum ValueType {
    REG_NONE,
    REG_SZ,
    REG_EXPAND_SZ,
    REG_BINARY,
    REG_DWORD,
    REG_DWORD_BIG_ENDIAN,
    REG_LINK,
    REG_MULTI_SZ,
    REG_QWORD,
    /// Resource lists and anything newer than this enum.
    REG_OTHER,
}

/// Decoded scalar held by an [`Entry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    String(String),
    Integer(u64),
    MultiString(Vec<String>),
    Bytes(Vec<u8>),
}

impl Value {
    /// JSON form used in remote records. Byte blobs become lowercase hex.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Integer(n) => serde_json::Value::from(*n),
            Self::MultiString(items) => serde_json::Value::from(items.clone()),
            Self::Bytes(bytes) => serde_json::Value::String(hex::encode(bytes)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{n}"),
            Self::MultiString(items) => write!(f, "[{}]", items.join(", ")),
            Self::Bytes(bytes) => f.write_str(&hex::encode(bytes)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Integer(u64::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::Integer(n)
    }
}

/// One named value found directly under a probed subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub value: Value,
    pub value_type: ValueType,
}

impl Entry {
    pub fn new(name: impl Into<String>, value: impl Into<Value>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            value_type,
        }
    }
}

/// Read-only view of the hierarchical store.
///
/// Implementations must return entries in a stable order for a given
/// subtree, so that repeated enumerations within one sweep agree. Reads are
/// blocking; callers on an async runtime move them onto a blocking thread.
pub trait StoreReader: Send + Sync + 'static {
    /// Short backend name for diagnostics.
    fn name(&self) -> &str;

    /// List the values directly under `path` in `root`.
    ///
    /// # Errors
    /// - `SourceError::NotFound` if the path does not exist
    /// - `SourceError::Access` if it exists but cannot be read
    fn enumerate(&self, root: Hive, path: &str) -> Result<Vec<Entry>, SourceError>;
}

/// Canonical lookup form of a subtree path.
///
/// Separators become backslashes, surrounding separators are dropped and
/// the result is lowercased, since key names are case-insensitive.
pub fn normalize_path(path: &str) -> String {
    path.trim()
        .replace('/', "\\")
        .trim_matches('\\')
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hive_parse_short_and_long_names() {
        assert_eq!("HKLM".parse::<Hive>().unwrap(), Hive::LocalMachine);
        assert_eq!("hkcu".parse::<Hive>().unwrap(), Hive::CurrentUser);
        assert_eq!(
            "HKEY_LOCAL_MACHINE".parse::<Hive>().unwrap(),
            Hive::LocalMachine
        );
        assert!("HKXX".parse::<Hive>().is_err());
        assert_eq!(Hive::CurrentUser.to_string(), "HKCU");
    }

    #[test]
    fn test_hive_serde_alias() {
        let hive: Hive = serde_yaml::from_str("HKEY_CURRENT_USER").unwrap();
        assert_eq!(hive, Hive::CurrentUser);
        assert_eq!(serde_yaml::to_string(&hive).unwrap().trim(), "HKCU");
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::from("C:\\upd.exe").to_string(), "C:\\upd.exe");
        assert_eq!(Value::from(42u32).to_string(), "42");
        assert_eq!(Value::Bytes(vec![0xde, 0xad, 0x01]).to_string(), "dead01");
        assert_eq!(
            Value::MultiString(vec!["a".into(), "b".into()]).to_string(),
            "[a, b]"
        );
    }

    #[test]
    fn test_value_to_json() {
        assert_eq!(Value::from(7u64).to_json(), serde_json::json!(7));
        assert_eq!(Value::Bytes(vec![0xff]).to_json(), serde_json::json!("ff"));
        assert_eq!(
            Value::MultiString(vec!["x".into()]).to_json(),
            serde_json::json!(["x"])
        );
    }

    #[test]
    fn test_value_type_names() {
        assert_eq!(ValueType::REG_SZ.to_string(), "REG_SZ");
        assert_eq!("REG_QWORD".parse::<ValueType>().unwrap(), ValueType::REG_QWORD);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("Software/Microsoft\\Run\\"),
            "software\\microsoft\\run"
        );
        assert_eq!(normalize_path("  \\HKCU\\Run "), "hkcu\\run");
    }
}
