//! Prometheus-style counters for publishers and subscribers.
//!
//! Recorded through the `metrics` facade; installing an exporter is up to
//! the application.

use metrics::counter;

/// Counters labeled with a transport and a topic.
#[derive(Debug, Clone)]
pub struct PubSubMetrics {
    transport: &'static str,
    topic: String,
}

impl PubSubMetrics {
    pub fn new(transport: &'static str, topic: &str) -> Self {
        Self {
            transport,
            topic: topic.to_string(),
        }
    }

    /// A message handed to a consumer (every attempt counts).
    pub fn message_received(&self) {
        counter!(
            "pubsub_messages_received_total",
            "transport" => self.transport,
            "topic" => self.topic.clone()
        )
        .increment(1);
    }

    pub fn message_acked(&self) {
        counter!(
            "pubsub_messages_acked_total",
            "transport" => self.transport,
            "topic" => self.topic.clone()
        )
        .increment(1);
    }

    pub fn message_nacked(&self) {
        counter!(
            "pubsub_messages_nacked_total",
            "transport" => self.transport,
            "topic" => self.topic.clone()
        )
        .increment(1);
    }

    /// Delivery given up because of shutdown or cancellation.
    pub fn message_abandoned(&self) {
        counter!(
            "pubsub_messages_abandoned_total",
            "transport" => self.transport,
            "topic" => self.topic.clone()
        )
        .increment(1);
    }

    pub fn poll_error(&self) {
        counter!(
            "pubsub_poll_errors_total",
            "transport" => self.transport,
            "topic" => self.topic.clone()
        )
        .increment(1);
    }

    pub fn message_published(&self) {
        counter!(
            "pubsub_messages_published_total",
            "transport" => self.transport,
            "topic" => self.topic.clone()
        )
        .increment(1);
    }

    pub fn publish_failed(&self) {
        counter!(
            "pubsub_publish_failures_total",
            "transport" => self.transport,
            "topic" => self.topic.clone()
        )
        .increment(1);
    }
}
