//! Centralized configuration for push registration.
//!
//! `PushConfig` carries the deployment-specific identifiers (sender ID,
//! platform application, topics). The unit structs below group the fixed
//! constants used by the stores, the registration flow and the directory.

use crate::error::{PushError, Result};
use crate::store::atomic_read_json;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Deployment identifiers for the push manager.
///
/// Mirrors the generated resource constants of the mobile client: one
/// messaging sender, one platform application, a default "all devices" topic
/// and any number of extra topics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// Messaging sender identity used to request device tokens.
    pub sender_id: String,
    /// Platform application the device endpoint is created under.
    pub platform_application_arn: String,
    /// Topic every device subscribes to on first run.
    pub default_topic_arn: String,
    /// Additional topics offered to the user.
    pub topic_arns: Vec<String>,
}

impl PushConfig {
    /// Create a config with the two required identifiers.
    pub fn new(sender_id: impl Into<String>, platform_application_arn: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            platform_application_arn: platform_application_arn.into(),
            ..Self::default()
        }
    }

    /// Set the default topic.
    pub fn with_default_topic(mut self, topic_arn: impl Into<String>) -> Self {
        self.default_topic_arn = topic_arn.into();
        self
    }

    /// Set the additional topics.
    pub fn with_topics<I, S>(mut self, topic_arns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topic_arns = topic_arns.into_iter().map(Into::into).collect();
        self
    }

    /// Load a config from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        atomic_read_json::<Self>(path)?.ok_or_else(|| PushError::Config {
            message: format!("Push config not found: {}", path.display()),
        })
    }

    /// Check the required fields.
    pub fn validate(&self) -> Result<()> {
        if self.sender_id.trim().is_empty() {
            return Err(PushError::Config {
                message: "Missing messaging sender ID.".to_string(),
            });
        }
        Ok(())
    }

    /// Every configured topic, default topic first.
    ///
    /// An empty default topic is skipped, and a topic listed twice keeps its
    /// first position.
    pub fn all_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = Vec::with_capacity(self.topic_arns.len() + 1);
        let candidates = std::iter::once(&self.default_topic_arn).chain(self.topic_arns.iter());
        for topic in candidates {
            if !topic.is_empty() && !topics.contains(topic) {
                topics.push(topic.clone());
            }
        }
        topics
    }
}

/// Persistence layout shared by the store backends.
pub struct StoreConfig;

impl StoreConfig {
    pub const STATE_FILE_NAME: &'static str = "push-state.json";
    pub const SQLITE_FILE_NAME: &'static str = "push-state.sqlite";
    pub const DEFAULT_NAMESPACE: &'static str = "push_manager";
    pub const STATE_KEY: &'static str = "registration";
    /// Current `PersistedPushState` layout.
    pub const SCHEMA_VERSION: u32 = 1;
}

/// Timing of the first-run registration.
pub struct RegistrationConfig;

impl RegistrationConfig {
    pub const INITIAL_ATTEMPTS: u32 = 3;
    pub const INITIAL_BASE_DELAY: Duration = Duration::from_secs(2);
    pub const INITIAL_MAX_DELAY: Duration = Duration::from_secs(30);
    pub const FOREGROUND_THREAD_NAME: &'static str = "push-foreground";
}

/// Notification directory attribute names.
pub struct SnsConfig;

impl SnsConfig {
    pub const ENDPOINT_ATTRIBUTE_ENABLED: &'static str = "Enabled";
}
