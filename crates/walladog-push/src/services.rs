//! External services the push manager talks to.
//!
//! Both traits are the narrow seams around vendor SDKs: the registrar issues
//! device tokens from the push platform, the directory maps tokens to
//! endpoints and manages topic subscriptions. Implementations own their
//! credentials and client configuration.

use async_trait::async_trait;

/// Issues device tokens from the push platform.
#[async_trait]
pub trait MessagingRegistrar: Send + Sync {
    /// Register this app instance with the platform and return its token.
    async fn register(&self, sender_id: &str) -> anyhow::Result<String>;
}

/// Maps device tokens to endpoints and manages topic subscriptions.
#[async_trait]
pub trait NotificationDirectory: Send + Sync {
    /// Create (or look up) the endpoint for a device token.
    ///
    /// Returns the endpoint ARN.
    async fn create_endpoint(
        &self,
        platform_application_arn: &str,
        device_token: &str,
    ) -> anyhow::Result<String>;

    /// Subscribe an endpoint to a topic.
    ///
    /// Returns the subscription ARN.
    async fn subscribe(&self, endpoint_arn: &str, topic_arn: &str) -> anyhow::Result<String>;

    /// Remove a subscription.
    async fn unsubscribe(&self, subscription_arn: &str) -> anyhow::Result<()>;

    /// Set a single endpoint attribute, e.g. `Enabled`.
    async fn set_endpoint_attribute(
        &self,
        endpoint_arn: &str,
        name: &str,
        value: &str,
    ) -> anyhow::Result<()>;
}
