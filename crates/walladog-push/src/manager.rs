//! The push registration manager.
//!
//! `PushManager` owns the device's registration record and topic list, and
//! drives the messaging registrar and notification directory to change them.
//! Every mutation is persisted as one record before it becomes visible in
//! memory, so a failure halfway through an operation leaves both the store
//! and the in-memory state as they were.

use crate::builder::PushManagerBuilder;
use crate::config::{PushConfig, SnsConfig, StoreConfig};
use crate::error::{PushError, Result};
use crate::notify::{PushStateListener, StateNotifier};
use crate::registration::InitialRegistration;
use crate::services::{MessagingRegistrar, NotificationDirectory};
use crate::store::{PersistedPushState, PushStateStore};
use crate::topic::SnsTopic;
use chrono::Utc;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info};

/// Registers the device for push notifications and manages its topic
/// subscriptions.
///
/// Cheap to clone; all clones share the same state. Mutating operations are
/// serialized internally, queries never wait on network I/O.
#[derive(Clone)]
pub struct PushManager {
    pub(crate) shared: Arc<Shared>,
}

pub(crate) struct Shared {
    pub(crate) sender_id: String,
    pub(crate) platform_application_arn: String,
    pub(crate) default_topic_arn: String,
    pub(crate) registrar: Arc<dyn MessagingRegistrar>,
    pub(crate) directory: Arc<dyn NotificationDirectory>,
    pub(crate) store: Arc<dyn PushStateStore>,
    pub(crate) notifier: StateNotifier,
    pub(crate) state: RwLock<ManagerState>,
    /// Held for the whole of every mutating operation.
    pub(crate) op_lock: tokio::sync::Mutex<()>,
    pub(crate) initial: Mutex<Option<InitialRegistration>>,
}

/// In-memory view of the registration.
///
/// `topics` always mirrors `record.subscriptions`.
pub(crate) struct ManagerState {
    pub(crate) record: PersistedPushState,
    pub(crate) topics: Vec<SnsTopic>,
}

impl ManagerState {
    pub(crate) fn new(record: PersistedPushState) -> Self {
        Self {
            record,
            topics: Vec::new(),
        }
    }

    fn sync_topics(&mut self) {
        for topic in &mut self.topics {
            let subscription = self.record.subscription_for(topic.topic_arn()).to_string();
            topic.set_subscription_arn(subscription);
        }
    }
}

impl PushManager {
    /// Start configuring a manager.
    pub fn builder(config: PushConfig) -> PushManagerBuilder {
        PushManagerBuilder::new(config)
    }

    // ========================================
    // Registration
    // ========================================

    /// Register this device with the messaging registrar and create its
    /// endpoint in the notification directory.
    ///
    /// On success the new registration is persisted, push is enabled and
    /// the listener is told. Returns the endpoint ARN.
    pub async fn register_device(&self) -> Result<String> {
        let _guard = self.shared.op_lock.lock().await;
        self.register_device_locked().await
    }

    /// Registration body. The caller must hold `op_lock`.
    pub(crate) async fn register_device_locked(&self) -> Result<String> {
        let shared = &self.shared;

        let device_token = shared
            .registrar
            .register(&shared.sender_id)
            .await
            .map_err(PushError::registration)?;
        if device_token.trim().is_empty() {
            return Err(PushError::Registration {
                message: "Unable to register with messaging service. Empty device token."
                    .to_string(),
                cause: None,
            });
        }
        debug!("Device token: {}", device_token);

        let endpoint_arn = shared
            .directory
            .create_endpoint(&shared.platform_application_arn, &device_token)
            .await
            .map_err(|e| PushError::directory("create_endpoint", e))?;
        if endpoint_arn.is_empty() {
            return Err(PushError::Directory {
                operation: "create_endpoint",
                message: "empty endpoint ARN".to_string(),
            });
        }
        debug!("Endpoint ARN: {}", endpoint_arn);

        let mut record = self.record();
        record.device_token = device_token;
        record.endpoint_arn = endpoint_arn.clone();
        record.push_enabled = true;
        record.platform_application_arn = shared.platform_application_arn.clone();
        self.commit(record)?;

        info!("Device registered for push notifications");
        self.notify(true);
        Ok(endpoint_arn)
    }

    // ========================================
    // Topics
    // ========================================

    /// Replace the topic list.
    ///
    /// Subscription ARNs persisted by an earlier run are attached to the
    /// matching topics. No directory calls are made.
    pub fn set_topics<I, S>(&self, topic_arns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.write_state();
        let topics: Vec<SnsTopic> = topic_arns
            .into_iter()
            .map(|arn| {
                let arn = arn.into();
                let subscription = state.record.subscription_for(&arn).to_string();
                SnsTopic::new(arn, subscription)
            })
            .collect();
        debug!("Set {} push topics", topics.len());
        state.topics = topics;
    }

    /// Subscribe the device endpoint to a topic.
    ///
    /// The subscription ARN is stored on `topic`, on the manager's entry
    /// for the same topic and in the persisted record.
    pub async fn subscribe_to_topic(&self, topic: &mut SnsTopic) -> Result<()> {
        let _guard = self.shared.op_lock.lock().await;
        self.subscribe_locked(topic).await
    }

    /// Subscription body. The caller must hold `op_lock`.
    pub(crate) async fn subscribe_locked(&self, topic: &mut SnsTopic) -> Result<()> {
        let endpoint_arn = self.endpoint_arn();
        if endpoint_arn.is_empty() {
            return Err(PushError::NotRegistered);
        }

        let subscription_arn = self
            .shared
            .directory
            .subscribe(&endpoint_arn, topic.topic_arn())
            .await
            .map_err(|e| PushError::directory("subscribe", e))?;
        if subscription_arn.is_empty() {
            return Err(PushError::Directory {
                operation: "subscribe",
                message: "empty subscription ARN".to_string(),
            });
        }

        let mut record = self.record();
        record
            .subscriptions
            .insert(topic.topic_arn().to_string(), subscription_arn.clone());
        self.commit(record)?;

        debug!("Subscribed to topic {}", topic.name());
        topic.set_subscription_arn(subscription_arn);
        Ok(())
    }

    /// Remove the device's subscription to a topic.
    ///
    /// A topic without a local subscription ARN is left alone: local state
    /// is trusted, so a subscription the device lost track of (cleared app
    /// data) is not looked up remotely.
    pub async fn unsubscribe_from_topic(&self, topic: &mut SnsTopic) -> Result<()> {
        if !topic.is_subscribed() {
            debug!("Topic {} is not subscribed, nothing to do", topic.name());
            return Ok(());
        }

        let _guard = self.shared.op_lock.lock().await;

        self.shared
            .directory
            .unsubscribe(topic.subscription_arn())
            .await
            .map_err(|e| PushError::directory("unsubscribe", e))?;

        let mut record = self.record();
        record.subscriptions.remove(topic.topic_arn());
        self.commit(record)?;

        debug!("Unsubscribed from topic {}", topic.name());
        topic.set_subscription_arn("");
        Ok(())
    }

    // ========================================
    // Enable / disable
    // ========================================

    /// Enable or disable delivery to this device's endpoint.
    pub async fn set_push_enabled(&self, enabled: bool) -> Result<()> {
        let _guard = self.shared.op_lock.lock().await;

        let endpoint_arn = self.endpoint_arn();
        if endpoint_arn.is_empty() {
            return Err(PushError::NotRegistered);
        }

        self.shared
            .directory
            .set_endpoint_attribute(
                &endpoint_arn,
                SnsConfig::ENDPOINT_ATTRIBUTE_ENABLED,
                if enabled { "true" } else { "false" },
            )
            .await
            .map_err(|e| PushError::directory("set_endpoint_attribute", e))?;
        debug!(
            "Set push {} for endpoint {}",
            if enabled { "enabled" } else { "disabled" },
            endpoint_arn
        );

        let mut record = self.record();
        record.push_enabled = enabled;
        record.platform_application_arn = self.shared.platform_application_arn.clone();
        self.commit(record)?;

        self.notify(enabled);
        Ok(())
    }

    // ========================================
    // Queries
    // ========================================

    /// True once the device has an endpoint.
    pub fn is_registered(&self) -> bool {
        !self.read_state().record.endpoint_arn.is_empty()
    }

    /// Last known enabled flag.
    pub fn is_push_enabled(&self) -> bool {
        self.read_state().record.push_enabled
    }

    /// Snapshot of the topic list.
    pub fn topics(&self) -> Vec<SnsTopic> {
        self.read_state().topics.clone()
    }

    /// Snapshot of a single topic, if it is in the list.
    pub fn topic(&self, topic_arn: &str) -> Option<SnsTopic> {
        self.read_state()
            .topics
            .iter()
            .find(|t| t.topic_arn() == topic_arn)
            .cloned()
    }

    /// Endpoint ARN, empty when not registered.
    pub fn endpoint_arn(&self) -> String {
        self.read_state().record.endpoint_arn.clone()
    }

    /// Device token, empty when not registered.
    pub fn device_token(&self) -> String {
        self.read_state().record.device_token.clone()
    }

    pub fn platform_application_arn(&self) -> &str {
        &self.shared.platform_application_arn
    }

    pub fn default_topic_arn(&self) -> &str {
        &self.shared.default_topic_arn
    }

    // ========================================
    // Listener and first-run task
    // ========================================

    /// Replace the state listener. `None` removes it.
    pub fn set_state_listener(&self, listener: Option<Arc<dyn PushStateListener>>) {
        self.shared.notifier.set_listener(listener);
    }

    /// Take the handle of the first-run registration.
    ///
    /// Returns `None` when this run restored an existing registration, or
    /// when the handle was already taken.
    pub fn take_initial_registration(&self) -> Option<InitialRegistration> {
        self.shared
            .initial
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    // ========================================
    // Internals
    // ========================================

    pub(crate) fn notify(&self, enabled: bool) {
        self.shared.notifier.notify(self, enabled);
    }

    fn record(&self) -> PersistedPushState {
        self.read_state().record.clone()
    }

    /// Persist `record`, then make it the in-memory state.
    fn commit(&self, mut record: PersistedPushState) -> Result<()> {
        record.schema_version = StoreConfig::SCHEMA_VERSION;
        record.updated_at = Some(Utc::now());
        self.shared.store.save(&record)?;

        let mut state = self.write_state();
        state.record = record;
        state.sync_topics();
        Ok(())
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, ManagerState> {
        self.shared
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, ManagerState> {
        self.shared
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for PushManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read_state();
        f.debug_struct("PushManager")
            .field("platform_application_arn", &self.shared.platform_application_arn)
            .field("endpoint_arn", &state.record.endpoint_arn)
            .field("push_enabled", &state.record.push_enabled)
            .field("topics", &state.topics.len())
            .finish()
    }
}
