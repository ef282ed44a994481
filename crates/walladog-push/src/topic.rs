//! Notification topics.

/// A notification topic and this device's subscription to it.
///
/// An empty subscription ARN means "not subscribed".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnsTopic {
    topic_arn: String,
    subscription_arn: String,
}

impl SnsTopic {
    pub fn new(topic_arn: impl Into<String>, subscription_arn: impl Into<String>) -> Self {
        Self {
            topic_arn: topic_arn.into(),
            subscription_arn: subscription_arn.into(),
        }
    }

    pub fn topic_arn(&self) -> &str {
        &self.topic_arn
    }

    pub fn subscription_arn(&self) -> &str {
        &self.subscription_arn
    }

    /// Short display name: the last `:`-separated segment of the ARN.
    pub fn name(&self) -> &str {
        self.topic_arn
            .rsplit(':')
            .next()
            .unwrap_or(&self.topic_arn)
    }

    pub fn is_subscribed(&self) -> bool {
        !self.subscription_arn.is_empty()
    }

    pub(crate) fn set_subscription_arn(&mut self, subscription_arn: impl Into<String>) {
        self.subscription_arn = subscription_arn.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_from_arn() {
        let topic = SnsTopic::new("arn:aws:sns:us-east-1:123456789012:walladog_alldevices", "");
        assert_eq!(topic.name(), "walladog_alldevices");

        let bare = SnsTopic::new("promo", "");
        assert_eq!(bare.name(), "promo");
    }

    #[test]
    fn test_subscription_state() {
        let mut topic = SnsTopic::new("arn:topic:all", "");
        assert!(!topic.is_subscribed());

        topic.set_subscription_arn("arn:topic:all:sub-1");
        assert!(topic.is_subscribed());
        assert_eq!(topic.subscription_arn(), "arn:topic:all:sub-1");
    }
}
