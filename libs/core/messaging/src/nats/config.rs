//! Configuration for the NATS JetStream binding.

use crate::naming::{ConstantName, ConsumerName, NamingStrategy, TopicName};
use std::sync::Arc;
use std::time::Duration;

/// Maps topics to JetStream names and tunes redelivery.
#[derive(Debug, Clone)]
pub struct NatsConfig {
    /// Stream holding the topic's subject (default: `PUBSUB`)
    pub stream: Arc<dyn NamingStrategy>,

    /// Subject a topic is published on (default: the topic itself)
    pub subject: Arc<dyn NamingStrategy>,

    /// Durable pull consumer name (default: `pubsub-{topic}`).
    ///
    /// A durable consumer filters exactly one subject, so this should map
    /// distinct topics to distinct names.
    pub consumer: Arc<dyn NamingStrategy>,

    /// Delay before a nacked message is delivered again
    pub resend_interval: Duration,

    /// How long the broker waits for an ack before redelivering
    pub ack_wait: Duration,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            stream: Arc::new(ConstantName::new("PUBSUB")),
            subject: Arc::new(TopicName),
            consumer: Arc::new(ConsumerName::new("pubsub")),
            resend_interval: Duration::from_secs(1),
            ack_wait: Duration::from_secs(30),
        }
    }
}

impl NatsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stream(mut self, naming: impl NamingStrategy + 'static) -> Self {
        self.stream = Arc::new(naming);
        self
    }

    pub fn with_subject(mut self, naming: impl NamingStrategy + 'static) -> Self {
        self.subject = Arc::new(naming);
        self
    }

    pub fn with_consumer(mut self, naming: impl NamingStrategy + 'static) -> Self {
        self.consumer = Arc::new(naming);
        self
    }

    pub fn with_resend_interval(mut self, interval: Duration) -> Self {
        self.resend_interval = interval;
        self
    }

    pub fn with_ack_wait(mut self, ack_wait: Duration) -> Self {
        self.ack_wait = ack_wait;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::PrefixedName;

    #[test]
    fn test_defaults() {
        let config = NatsConfig::default();
        assert_eq!(config.stream.name_for("orders"), "PUBSUB");
        assert_eq!(config.subject.name_for("orders"), "orders");
        assert_eq!(config.consumer.name_for("orders"), "pubsub-orders");
        assert_ne!(
            config.consumer.name_for("orders.created"),
            config.consumer.name_for("orders.cancelled")
        );
        assert_eq!(config.resend_interval, Duration::from_secs(1));
        assert_eq!(config.ack_wait, Duration::from_secs(30));
    }

    #[test]
    fn test_builder_overrides_naming() {
        let config = NatsConfig::new()
            .with_stream(ConstantName::new("ORDERS"))
            .with_subject(PrefixedName::new("orders", "."))
            .with_consumer(PrefixedName::new("billing", "-"));
        assert_eq!(config.stream.name_for("created"), "ORDERS");
        assert_eq!(config.subject.name_for("created"), "orders.created");
        assert_eq!(config.consumer.name_for("created"), "billing-created");
    }
}
