//! First-run registration.
//!
//! When no usable registration was persisted, the builder starts this flow
//! in the background: register the device (with retries), then subscribe to
//! the default topic if it heads the topic list. The host can observe the
//! outcome through [`InitialRegistration`], or ignore it.
//!
//! Host calls interleave with the retries. If the host registers the device
//! while the flow is backing off, the next attempt adopts that registration
//! instead of requesting another token.

use crate::error::{PushError, Result};
use crate::manager::PushManager;
use crate::retry::{retry_async, RetryConfig};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Outcome of a successful first-run registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialRegistrationReport {
    pub endpoint_arn: String,
    /// Default topic subscribed to, if any.
    pub subscribed_topic: Option<String>,
    /// Registration attempts made, including the successful one.
    pub attempts: u32,
}

/// Handle to the background first-run registration.
///
/// Dropping the handle does not cancel the task.
#[derive(Debug)]
pub struct InitialRegistration {
    handle: JoinHandle<Result<InitialRegistrationReport>>,
}

impl InitialRegistration {
    pub(crate) fn spawn(manager: PushManager, retry: RetryConfig) -> Self {
        let handle = tokio::spawn(async move {
            let result = run(&manager, &retry).await;
            match &result {
                Ok(report) => info!(
                    "Push notifications - OK (endpoint {}, {} attempt(s))",
                    report.endpoint_arn, report.attempts
                ),
                Err(e) => error!("Failed to complete initial push notification setup: {}", e),
            }
            result
        });
        Self { handle }
    }

    /// Wait for the registration to finish.
    ///
    /// Errors were already logged by the task; they are returned here for
    /// hosts that want to react to them.
    pub async fn wait(self) -> Result<InitialRegistrationReport> {
        self.handle
            .await
            .map_err(|e| PushError::Other(format!("Initial registration task failed: {}", e)))?
    }
}

async fn run(manager: &PushManager, retry: &RetryConfig) -> Result<InitialRegistrationReport> {
    info!("Initial app startup - registering for push notifications");

    // Lock per attempt; backoff sleeps run unlocked
    let initial_endpoint = manager.endpoint_arn();
    let initial_endpoint = initial_endpoint.as_str();
    let (result, stats) = retry_async(
        retry,
        move || async move {
            let _guard = manager.shared.op_lock.lock().await;
            let current = manager.endpoint_arn();
            if !current.is_empty() && current != initial_endpoint {
                debug!("Device was registered by the host during startup, reusing {}", current);
                return Ok(current);
            }
            manager.register_device_locked().await
        },
        PushError::is_retryable,
    )
    .await;
    let endpoint_arn = result?;

    let _guard = manager.shared.op_lock.lock().await;

    // Only subscribe when the default topic is intact at the head of the list
    let default_topic = manager
        .topics()
        .into_iter()
        .next()
        .filter(|t| t.topic_arn().eq_ignore_ascii_case(manager.default_topic_arn()));

    let subscribed_topic = match default_topic {
        Some(mut topic) => {
            manager.subscribe_locked(&mut topic).await?;
            info!("Push notifications - registered with default topic {}", topic.name());
            Some(topic.topic_arn().to_string())
        }
        None => None,
    };

    Ok(InitialRegistrationReport {
        endpoint_arn,
        subscribed_topic,
        attempts: stats.attempts,
    })
}
