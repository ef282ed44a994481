//! Durable storage for the push registration record.
//!
//! The whole registration (token, endpoint, enabled flag, platform
//! fingerprint and topic subscriptions) is one versioned record. Backends
//! read and write it as a unit, so a failed operation never leaves half of
//! its changes on disk.
//!
//! Backends:
//! - [`JsonFileStore`] - atomic JSON file
//! - [`SqliteStore`] - namespaced key/value table in SQLite
//! - [`MemoryStore`] - in-process only

mod atomic;
mod json;
mod sqlite;

pub use atomic::{atomic_read_json, atomic_write_json};
pub use json::JsonFileStore;
pub use sqlite::SqliteStore;

use crate::config::StoreConfig;
use crate::error::{PushError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// The persisted registration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedPushState {
    /// Layout version, see [`StoreConfig::SCHEMA_VERSION`].
    pub schema_version: u32,
    pub device_token: String,
    pub endpoint_arn: String,
    pub push_enabled: bool,
    /// Platform application the registration was made under.
    pub platform_application_arn: String,
    /// Topic ARN -> subscription ARN for subscribed topics.
    pub subscriptions: BTreeMap<String, String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for PersistedPushState {
    fn default() -> Self {
        Self {
            schema_version: StoreConfig::SCHEMA_VERSION,
            device_token: String::new(),
            endpoint_arn: String::new(),
            push_enabled: false,
            platform_application_arn: String::new(),
            subscriptions: BTreeMap::new(),
            updated_at: None,
        }
    }
}

impl PersistedPushState {
    /// Reject records written by a newer library.
    pub fn check_schema(&self) -> Result<()> {
        if self.schema_version > StoreConfig::SCHEMA_VERSION {
            return Err(PushError::UnsupportedSchema {
                found: self.schema_version,
                supported: StoreConfig::SCHEMA_VERSION,
            });
        }
        Ok(())
    }

    /// Subscription ARN persisted for a topic, empty if none.
    pub fn subscription_for(&self, topic_arn: &str) -> &str {
        self.subscriptions
            .get(topic_arn)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Drop everything tied to the current endpoint.
    pub(crate) fn discard_registration(&mut self) {
        self.device_token.clear();
        self.endpoint_arn.clear();
        self.push_enabled = false;
        self.platform_application_arn.clear();
        self.subscriptions.clear();
    }
}

/// Storage backend for the registration record.
///
/// All operations are synchronous; implementations must make `save` atomic
/// with respect to concurrent `load` calls.
pub trait PushStateStore: Send + Sync {
    /// Load the stored record, `None` if nothing was saved yet.
    fn load(&self) -> Result<Option<PersistedPushState>>;

    /// Replace the stored record.
    fn save(&self, state: &PersistedPushState) -> Result<()>;
}

/// In-process store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<Option<PersistedPushState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a record.
    pub fn with_state(state: PersistedPushState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
        }
    }

    /// Copy of the stored record.
    pub fn snapshot(&self) -> Option<PersistedPushState> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PushStateStore for MemoryStore {
    fn load(&self) -> Result<Option<PersistedPushState>> {
        Ok(self.snapshot())
    }

    fn save(&self, state: &PersistedPushState) -> Result<()> {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = Some(state.clone());
        Ok(())
    }
}
