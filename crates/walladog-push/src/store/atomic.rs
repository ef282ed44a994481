//! Crash-safe JSON files.
//!
//! A save goes to a sibling temp file (named after the writing process and
//! thread), is synced to disk and then renamed over the target. Readers
//! therefore see the old record or the new one, never a mix.

use crate::error::{PushError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Read and parse a JSON file. A missing file is `Ok(None)`.
pub fn atomic_read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error("read", path, e)),
    };

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| PushError::Json {
            message: format!("Failed to parse {}: {}", path.display(), e),
            source: Some(e),
        })
}

/// Replace a JSON file atomically.
///
/// With `keep_backup` the file being replaced is first copied to
/// `<name>.json.bak`; a failed copy is logged and does not stop the save.
pub fn atomic_write_json<T: Serialize>(path: &Path, data: &T, keep_backup: bool) -> Result<()> {
    let serialized = serde_json::to_vec_pretty(data)?;

    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| io_error("create directory", parent, e))?;
        }
        _ => {}
    }

    let temp_path = temp_path_for(path);
    if let Err(e) = write_synced(&temp_path, &serialized) {
        let _ = fs::remove_file(&temp_path);
        return Err(io_error("write", &temp_path, e));
    }

    if keep_backup {
        let backup_path = path.with_extension("json.bak");
        match fs::copy(path, &backup_path) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to back up {}: {}", path.display(), e),
        }
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        io_error("replace", path, e)
    })?;

    debug!("Wrote {} ({} bytes)", path.display(), serialized.len());
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// `state.json` -> `state.json.<pid>.<tid>.tmp`, unique per writer.
fn temp_path_for(path: &Path) -> PathBuf {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    path.with_extension(format!("json.{}.{}.tmp", std::process::id(), hasher.finish()))
}

fn io_error(action: &str, path: &Path, source: io::Error) -> PushError {
    PushError::Io {
        message: format!("Failed to {} {}: {}", action, path.display(), source),
        path: Some(path.to_path_buf()),
        source: Some(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestData {
        token: String,
        enabled: bool,
    }

    #[test]
    fn test_atomic_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");

        let data = TestData {
            token: "T1".to_string(),
            enabled: true,
        };

        atomic_write_json(&path, &data, false).unwrap();
        assert!(path.exists());

        let read_data: Option<TestData> = atomic_read_json(&path).unwrap();
        assert_eq!(read_data, Some(data));
    }

    #[test]
    fn test_atomic_write_creates_backup() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");

        let first = TestData {
            token: "T1".to_string(),
            enabled: true,
        };
        let second = TestData {
            token: "T2".to_string(),
            enabled: false,
        };

        atomic_write_json(&path, &first, true).unwrap();
        atomic_write_json(&path, &second, true).unwrap();

        let backup_path = path.with_extension("json.bak");
        let backup: Option<TestData> = atomic_read_json(&backup_path).unwrap();
        assert_eq!(backup, Some(first));

        let current: Option<TestData> = atomic_read_json(&path).unwrap();
        assert_eq!(current, Some(second));
    }

    #[test]
    fn test_atomic_read_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nonexistent.json");

        let result: Option<TestData> = atomic_read_json(&path).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_atomic_read_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = atomic_read_json::<TestData>(&path);
        assert!(matches!(result, Err(PushError::Json { .. })));
    }

    #[test]
    fn test_atomic_write_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("files").join("push").join("state.json");

        let data = TestData {
            token: "nested".to_string(),
            enabled: false,
        };

        atomic_write_json(&path, &data, false).unwrap();
        assert!(path.exists());
    }
}
