use super::{encode_headers, NatsConfig};
use crate::error::PublishError;
use crate::message::Message;
use crate::metrics::PubSubMetrics;
use crate::pubsub::Publisher;
use async_nats::jetstream::Context;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Publishes messages to JetStream, waiting for the broker ack of each one.
pub struct NatsPublisher {
    jetstream: Context,
    config: NatsConfig,
    closed: AtomicBool,
}

impl NatsPublisher {
    pub fn new(jetstream: Context, config: NatsConfig) -> Self {
        Self {
            jetstream,
            config,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Publisher for NatsPublisher {
    async fn publish(&self, topic: &str, messages: Vec<Message>) -> Result<(), PublishError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PublishError::PublisherClosed);
        }

        let subject = self.config.subject.name_for(topic);
        let metrics = PubSubMetrics::new("nats", topic);

        for msg in &messages {
            let headers = encode_headers(msg).map_err(|e| PublishError::Marshal {
                uuid: msg.uuid().to_string(),
                reason: e.to_string(),
            })?;
            let payload = Bytes::copy_from_slice(msg.payload());

            let ack = match self
                .jetstream
                .publish_with_headers(subject.clone(), headers, payload)
                .await
            {
                Ok(ack) => ack,
                Err(e) => {
                    metrics.publish_failed();
                    return Err(PublishError::transport(e));
                }
            };
            let ack = match ack.await {
                Ok(ack) => ack,
                Err(e) => {
                    metrics.publish_failed();
                    return Err(PublishError::transport(e));
                }
            };

            metrics.message_published();
            debug!(
                subject = %subject,
                msg_uuid = %msg.uuid(),
                sequence = ack.sequence,
                "Message published"
            );
        }

        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
