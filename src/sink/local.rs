//! Append-only local log.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::SinkError;

/// Durable text log.
///
/// The file is opened in append mode for every write and closed before the
/// call returns, so no handle outlives a single line. The log is never
/// truncated, rotated or size-bounded.
#[derive(Debug, Clone)]
pub struct LocalLog {
    path: PathBuf,
}

impl LocalLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `line` followed by a newline and flush it.
    ///
    /// The parent directory is created on first use.
    pub fn append(&self, line: &str) -> Result<(), SinkError> {
        self.write_all(line).map_err(|source| SinkError::LocalWrite {
            path: self.path.clone(),
            source,
        })
    }

    fn write_all(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        file.write_all(buf.as_bytes())?;
        file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_creates_parent_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forensic_output").join("log.txt");
        let log = LocalLog::new(&path);

        log.append("first").unwrap();
        log.append("second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_append_never_truncates_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        fs::write(&path, "previous run\n").unwrap();

        let log = LocalLog::new(&path);
        log.append("\n[+] OS Version").unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "previous run\n\n[+] OS Version\n"
        );
    }

    #[test]
    fn test_append_to_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let log = LocalLog::new(dir.path());

        let err = log.append("line").unwrap_err();
        assert!(matches!(err, SinkError::LocalWrite { .. }));
        assert!(err.to_string().contains("failed to append"));
    }
}
