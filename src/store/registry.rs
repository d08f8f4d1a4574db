//! Live Windows registry backend.

use std::io;

use winreg::RegKey;
use winreg::RegValue;
use winreg::enums::{
    HKEY_CLASSES_ROOT, HKEY_CURRENT_CONFIG, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, HKEY_USERS,
    KEY_READ, RegType,
};
use winreg::types::FromRegValue;

use super::types::{Entry, Hive, SourceError, StoreReader, Value, ValueType};

/// Reads values straight from the Windows registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryStore;

impl RegistryStore {
    pub fn new() -> Self {
        Self
    }
}

fn predef(root: Hive) -> RegKey {
    let hkey = match root {
        Hive::LocalMachine => HKEY_LOCAL_MACHINE,
        Hive::CurrentUser => HKEY_CURRENT_USER,
        Hive::Users => HKEY_USERS,
        Hive::ClassesRoot => HKEY_CLASSES_ROOT,
        Hive::CurrentConfig => HKEY_CURRENT_CONFIG,
    };
    RegKey::predef(hkey)
}

fn map_open_error(path: &str, err: io::Error) -> SourceError {
    match err.kind() {
        io::ErrorKind::NotFound => SourceError::NotFound {
            path: path.to_string(),
        },
        _ => SourceError::access(path, err),
    }
}

/// Decode a raw registry value into a typed [`Value`].
///
/// Values whose payload does not match their declared type fall back to
/// raw bytes rather than failing the whole enumeration.
fn decode(raw: &RegValue) -> (Value, ValueType) {
    let value_type = match raw.vtype {
        RegType::REG_NONE => ValueType::REG_NONE,
        RegType::REG_SZ => ValueType::REG_SZ,
        RegType::REG_EXPAND_SZ => ValueType::REG_EXPAND_SZ,
        RegType::REG_BINARY => ValueType::REG_BINARY,
        RegType::REG_DWORD => ValueType::REG_DWORD,
        RegType::REG_DWORD_BIG_ENDIAN => ValueType::REG_DWORD_BIG_ENDIAN,
        RegType::REG_LINK => ValueType::REG_LINK,
        RegType::REG_MULTI_SZ => ValueType::REG_MULTI_SZ,
        RegType::REG_QWORD => ValueType::REG_QWORD,
        _ => ValueType::REG_OTHER,
    };

    let value = match value_type {
        ValueType::REG_SZ | ValueType::REG_EXPAND_SZ | ValueType::REG_LINK => {
            String::from_reg_value(raw).ok().map(Value::String)
        }
        ValueType::REG_DWORD => u32::from_reg_value(raw).ok().map(Value::from),
        ValueType::REG_DWORD_BIG_ENDIAN => <[u8; 4]>::try_from(&raw.bytes[..])
            .ok()
            .map(|b| Value::from(u32::from_be_bytes(b))),
        ValueType::REG_QWORD => u64::from_reg_value(raw).ok().map(Value::Integer),
        ValueType::REG_MULTI_SZ => Vec::<String>::from_reg_value(raw)
            .ok()
            .map(Value::MultiString),
        _ => None,
    };

    (
        value.unwrap_or_else(|| Value::Bytes(raw.bytes.to_vec())),
        value_type,
    )
}

/// Decode enumerated values in order.
///
/// A failing item ends the enumeration; the entries read before it are kept.
fn collect_entries(
    path: &str,
    items: impl Iterator<Item = io::Result<(String, RegValue)>>,
) -> Vec<Entry> {
    let mut entries = Vec::new();
    for item in items {
        match item {
            Ok((name, raw)) => {
                let (value, value_type) = decode(&raw);
                entries.push(Entry {
                    name,
                    value,
                    value_type,
                });
            }
            Err(e) => {
                tracing::warn!(
                    path,
                    read = entries.len(),
                    error = %e,
                    "Registry value enumeration stopped early"
                );
                break;
            }
        }
    }
    entries
}

impl StoreReader for RegistryStore {
    fn name(&self) -> &str {
        "registry"
    }

    fn enumerate(&self, root: Hive, path: &str) -> Result<Vec<Entry>, SourceError> {
        let sub_key = path.replace('/', "\\");
        let key = predef(root)
            .open_subkey_with_flags(&sub_key, KEY_READ)
            .map_err(|e| map_open_error(path, e))?;

        let entries = collect_entries(path, key.enum_values());
        tracing::trace!(root = %root, path, count = entries.len(), "Enumerated registry key");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_not_found() {
        let store = RegistryStore::new();
        let err = store
            .enumerate(Hive::LocalMachine, r"Software\hivewatch-test\does-not-exist")
            .unwrap_err();
        assert!(matches!(err, SourceError::NotFound { .. }));
    }

    #[test]
    fn test_decode_dword() {
        let raw = RegValue {
            bytes: 5u32.to_le_bytes().to_vec(),
            vtype: RegType::REG_DWORD,
        };
        assert_eq!(decode(&raw), (Value::Integer(5), ValueType::REG_DWORD));
    }

    #[test]
    fn test_decode_malformed_falls_back_to_bytes() {
        let raw = RegValue {
            bytes: vec![1, 2],
            vtype: RegType::REG_QWORD,
        };
        assert_eq!(decode(&raw), (Value::Bytes(vec![1, 2]), ValueType::REG_QWORD));
    }

    #[test]
    fn test_enumeration_error_keeps_earlier_entries() {
        let items = vec![
            Ok((
                "Updater".to_string(),
                RegValue {
                    bytes: 7u32.to_le_bytes().to_vec(),
                    vtype: RegType::REG_DWORD,
                },
            )),
            Err(io::Error::from_raw_os_error(234)),
            Ok((
                "Unreached".to_string(),
                RegValue {
                    bytes: Vec::new(),
                    vtype: RegType::REG_NONE,
                },
            )),
        ];

        let entries = collect_entries("Run", items.into_iter());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Updater");
        assert_eq!(entries[0].value, Value::Integer(7));
    }
}
