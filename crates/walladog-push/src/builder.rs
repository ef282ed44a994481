//! Builder for configuring PushManager initialization.

use std::sync::{Arc, Mutex, RwLock};

use crate::config::PushConfig;
use crate::error::{PushError, Result};
use crate::manager::{ManagerState, PushManager, Shared};
use crate::notify::{ForegroundExecutor, ForegroundThread, PushStateListener, StateNotifier};
use crate::registration::InitialRegistration;
use crate::retry::RetryConfig;
use crate::services::{MessagingRegistrar, NotificationDirectory};
use crate::store::{PersistedPushState, PushStateStore};
use tracing::{debug, info, warn};

/// Builder for configuring PushManager initialization.
///
/// # Example
///
/// ```rust,ignore
/// use walladog_push::{JsonFileStore, PushConfig, PushManager};
///
/// let manager = PushManager::builder(PushConfig::from_json_file(&config_path)?)
///     .registrar(registrar)
///     .directory(directory)
///     .store(Arc::new(JsonFileStore::in_dir(&data_dir)))
///     .listener(Arc::new(|_: &PushManager, enabled: bool| {
///         println!("push enabled: {enabled}");
///         Ok(())
///     }))
///     .build()
///     .await?;
/// ```
pub struct PushManagerBuilder {
    config: PushConfig,
    topics: Option<Vec<String>>,
    registrar: Option<Arc<dyn MessagingRegistrar>>,
    directory: Option<Arc<dyn NotificationDirectory>>,
    store: Option<Arc<dyn PushStateStore>>,
    listener: Option<Arc<dyn PushStateListener>>,
    executor: Option<Arc<dyn ForegroundExecutor>>,
    retry: RetryConfig,
}

impl PushManagerBuilder {
    /// Create a new builder from the deployment config.
    pub fn new(config: PushConfig) -> Self {
        Self {
            config,
            topics: None,
            registrar: None,
            directory: None,
            store: None,
            listener: None,
            executor: None,
            retry: RetryConfig::default(),
        }
    }

    /// Messaging registrar issuing device tokens. Required.
    pub fn registrar(mut self, registrar: Arc<dyn MessagingRegistrar>) -> Self {
        self.registrar = Some(registrar);
        self
    }

    /// Notification directory managing endpoints and subscriptions. Required.
    pub fn directory(mut self, directory: Arc<dyn NotificationDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Store for the registration record. Required.
    pub fn store(mut self, store: Arc<dyn PushStateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Listener told about every push state change.
    pub fn listener(mut self, listener: Arc<dyn PushStateListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Context the listener runs on.
    ///
    /// Default: a dedicated `push-foreground` thread.
    pub fn foreground_executor(mut self, executor: Arc<dyn ForegroundExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Retry policy of the first-run registration.
    ///
    /// Default: 3 attempts, exponential backoff from 2s with jitter.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Use this topic list instead of [`PushConfig::all_topics`].
    pub fn topics<I, S>(mut self, topic_arns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = Some(topic_arns.into_iter().map(Into::into).collect());
        self
    }

    /// Build the PushManager instance.
    ///
    /// Restores the persisted registration. When there is none, or it was
    /// made under another platform application, the first-run registration
    /// is started in the background and `build` returns without waiting.
    pub async fn build(self) -> Result<PushManager> {
        self.config.validate()?;

        let registrar = self.registrar.ok_or_else(|| missing("messaging registrar"))?;
        let directory = self.directory.ok_or_else(|| missing("notification directory"))?;
        let store = self.store.ok_or_else(|| missing("push state store"))?;

        let executor: Arc<dyn ForegroundExecutor> = match self.executor {
            Some(executor) => executor,
            None => Arc::new(ForegroundThread::spawn()?),
        };

        let platform_application_arn = self.config.platform_application_arn.clone();
        let mut record = load_record(store.as_ref());

        let previous_platform = record.platform_application_arn.clone();
        if !previous_platform.is_empty()
            && !previous_platform.eq_ignore_ascii_case(&platform_application_arn)
        {
            info!(
                "App ran previously against platform application {}, discarding saved registration",
                previous_platform
            );
            record.discard_registration();
        }
        let first_run = record.platform_application_arn.is_empty();
        let push_enabled = record.push_enabled;

        let topics = self.topics.unwrap_or_else(|| self.config.all_topics());

        let manager = PushManager {
            shared: Arc::new(Shared {
                sender_id: self.config.sender_id,
                platform_application_arn,
                default_topic_arn: self.config.default_topic_arn,
                registrar,
                directory,
                store,
                notifier: StateNotifier::new(self.listener, executor),
                state: RwLock::new(ManagerState::new(record)),
                op_lock: tokio::sync::Mutex::new(()),
                initial: Mutex::new(None),
            }),
        };
        manager.set_topics(topics);

        if first_run {
            let initial = InitialRegistration::spawn(manager.clone(), self.retry);
            *manager
                .shared
                .initial
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(initial);
        } else {
            debug!("Restored push registration, enabled: {}", push_enabled);
            manager.notify(push_enabled);
        }

        Ok(manager)
    }
}

fn missing(what: &str) -> PushError {
    PushError::Config {
        message: format!("Missing {}.", what),
    }
}

/// Load the persisted record. Unreadable or too-new records count as a
/// first run.
fn load_record(store: &dyn PushStateStore) -> PersistedPushState {
    match store.load() {
        Ok(Some(record)) => match record.check_schema() {
            Ok(()) => record,
            Err(e) => {
                warn!("Ignoring persisted push state: {}", e);
                PersistedPushState::default()
            }
        },
        Ok(None) => PersistedPushState::default(),
        Err(e) => {
            warn!("Failed to load persisted push state, starting fresh: {}", e);
            PersistedPushState::default()
        }
    }
}
