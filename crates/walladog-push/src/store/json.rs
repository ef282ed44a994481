//! JSON file store for the registration record.

use super::{atomic_read_json, atomic_write_json, PersistedPushState, PushStateStore};
use crate::config::StoreConfig;
use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Keeps the registration record in `{data_dir}/push-state.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    keep_backup: bool,
}

impl JsonFileStore {
    /// Create a store at an explicit file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            keep_backup: false,
        }
    }

    /// Create a store at the default file name inside `data_dir`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(StoreConfig::STATE_FILE_NAME))
    }

    /// Keep the previous record as `push-state.json.bak` on every save.
    pub fn with_backup(mut self, keep_backup: bool) -> Self {
        self.keep_backup = keep_backup;
        self
    }

    /// Path of the record file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PushStateStore for JsonFileStore {
    fn load(&self) -> Result<Option<PersistedPushState>> {
        atomic_read_json(&self.path)
    }

    fn save(&self, state: &PersistedPushState) -> Result<()> {
        debug!(
            "Saving push state ({} subscriptions) to {}",
            state.subscriptions.len(),
            self.path.display()
        );
        atomic_write_json(&self.path, state, self.keep_backup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_empty() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::in_dir(tmp.path());
        assert!(store.load().unwrap().is_none());
        assert!(store.path().ends_with("push-state.json"));
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::in_dir(tmp.path());

        let mut state = PersistedPushState {
            device_token: "T1".into(),
            endpoint_arn: "E1".into(),
            push_enabled: true,
            platform_application_arn: "P1".into(),
            ..PersistedPushState::default()
        };
        state.subscriptions.insert("arn:topic:all".into(), "S1".into());

        store.save(&state).unwrap();

        let reopened = JsonFileStore::in_dir(tmp.path());
        assert_eq!(reopened.load().unwrap(), Some(state));
    }

    #[test]
    fn test_backup_keeps_previous_record() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::in_dir(tmp.path()).with_backup(true);

        let first = PersistedPushState {
            endpoint_arn: "E1".into(),
            ..PersistedPushState::default()
        };
        let second = PersistedPushState {
            endpoint_arn: "E2".into(),
            ..PersistedPushState::default()
        };
        store.save(&first).unwrap();
        store.save(&second).unwrap();

        let backup = JsonFileStore::new(tmp.path().join("push-state.json.bak"));
        assert_eq!(backup.load().unwrap(), Some(first));
        assert_eq!(store.load().unwrap(), Some(second));
    }
}
