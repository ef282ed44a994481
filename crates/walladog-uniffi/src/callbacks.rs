//! Foreign collaborators.
//!
//! The host implements these traits in Kotlin or Swift. Their methods are
//! blocking from Rust's point of view, so the adapters below move every
//! call onto tokio's blocking pool before handing it to the core library.

use crate::{FfiError, FfiPushManager};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use walladog_push::{
    ForegroundExecutor, ForegroundTask, MessagingRegistrar, NotificationDirectory, PushManager,
    PushStateListener,
};

/// Issues device tokens, e.g. through Firebase Cloud Messaging.
#[uniffi::export(with_foreign)]
pub trait FfiMessagingRegistrar: Send + Sync {
    fn register(&self, sender_id: String) -> Result<String, FfiError>;
}

/// Endpoint and topic management, e.g. through the SNS client.
#[uniffi::export(with_foreign)]
pub trait FfiNotificationDirectory: Send + Sync {
    fn create_endpoint(
        &self,
        platform_application_arn: String,
        device_token: String,
    ) -> Result<String, FfiError>;

    fn subscribe(&self, endpoint_arn: String, topic_arn: String) -> Result<String, FfiError>;

    fn unsubscribe(&self, subscription_arn: String) -> Result<(), FfiError>;

    fn set_endpoint_attribute(
        &self,
        endpoint_arn: String,
        name: String,
        value: String,
    ) -> Result<(), FfiError>;
}

#[uniffi::export(with_foreign)]
pub trait FfiPushStateListener: Send + Sync {
    fn on_push_state_change(
        &self,
        manager: Arc<FfiPushManager>,
        enabled: bool,
    ) -> Result<(), FfiError>;
}

/// Runs tasks on the host's main thread.
///
/// Implementations must call [`FfiForegroundTask::run`] exactly once per
/// task, in the order the tasks were received.
#[uniffi::export(with_foreign)]
pub trait FfiForegroundExecutor: Send + Sync {
    fn execute(&self, task: Arc<FfiForegroundTask>);
}

/// A queued notification for the host's main thread.
#[derive(uniffi::Object)]
pub struct FfiForegroundTask {
    task: Mutex<Option<ForegroundTask>>,
}

impl FfiForegroundTask {
    fn new(task: ForegroundTask) -> Self {
        Self {
            task: Mutex::new(Some(task)),
        }
    }
}

#[uniffi::export]
impl FfiForegroundTask {
    /// Run the task. Later calls do nothing.
    pub fn run(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task();
        }
    }
}

/// Run a foreign call on the blocking pool.
async fn blocking<T, F>(call: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, FfiError> + Send + 'static,
{
    Ok(tokio::task::spawn_blocking(call).await??)
}

pub(crate) struct RegistrarAdapter(pub(crate) Arc<dyn FfiMessagingRegistrar>);

#[async_trait]
impl MessagingRegistrar for RegistrarAdapter {
    async fn register(&self, sender_id: &str) -> anyhow::Result<String> {
        let foreign = self.0.clone();
        let sender_id = sender_id.to_string();
        blocking(move || foreign.register(sender_id)).await
    }
}

pub(crate) struct DirectoryAdapter(pub(crate) Arc<dyn FfiNotificationDirectory>);

#[async_trait]
impl NotificationDirectory for DirectoryAdapter {
    async fn create_endpoint(
        &self,
        platform_application_arn: &str,
        device_token: &str,
    ) -> anyhow::Result<String> {
        let foreign = self.0.clone();
        let (app, token) = (platform_application_arn.to_string(), device_token.to_string());
        blocking(move || foreign.create_endpoint(app, token)).await
    }

    async fn subscribe(&self, endpoint_arn: &str, topic_arn: &str) -> anyhow::Result<String> {
        let foreign = self.0.clone();
        let (endpoint, topic) = (endpoint_arn.to_string(), topic_arn.to_string());
        blocking(move || foreign.subscribe(endpoint, topic)).await
    }

    async fn unsubscribe(&self, subscription_arn: &str) -> anyhow::Result<()> {
        let foreign = self.0.clone();
        let subscription = subscription_arn.to_string();
        blocking(move || foreign.unsubscribe(subscription)).await
    }

    async fn set_endpoint_attribute(
        &self,
        endpoint_arn: &str,
        name: &str,
        value: &str,
    ) -> anyhow::Result<()> {
        let foreign = self.0.clone();
        let (endpoint, name, value) = (endpoint_arn.to_string(), name.to_string(), value.to_string());
        blocking(move || foreign.set_endpoint_attribute(endpoint, name, value)).await
    }
}

pub(crate) struct ListenerAdapter(pub(crate) Arc<dyn FfiPushStateListener>);

impl PushStateListener for ListenerAdapter {
    fn on_push_state_change(&self, manager: &PushManager, enabled: bool) -> anyhow::Result<()> {
        let manager = Arc::new(FfiPushManager::from(manager.clone()));
        Ok(self.0.on_push_state_change(manager, enabled)?)
    }
}

pub(crate) struct ExecutorAdapter(pub(crate) Arc<dyn FfiForegroundExecutor>);

impl ForegroundExecutor for ExecutorAdapter {
    fn execute(&self, task: ForegroundTask) {
        self.0.execute(Arc::new(FfiForegroundTask::new(task)));
    }
}
