use crate::{env_millis_or_default, env_or_default, ConfigError, FromEnv};
use std::time::Duration;

/// NATS JetStream connection settings
///
/// Environment variables:
/// - `NATS_URL` (default: `nats://127.0.0.1:4222`)
/// - `NATS_STREAM` (default: `PUBSUB`)
/// - `NATS_CONSUMER` (default: `pubsub`), prefix of the per-topic durable consumer
/// - `NATS_ACK_WAIT_MS` (default: 30000)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NatsConfig {
    pub url: String,
    pub stream: String,
    pub consumer: String,
    pub ack_wait: Duration,
}

impl FromEnv for NatsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env_or_default("NATS_URL", "nats://127.0.0.1:4222"),
            stream: env_or_default("NATS_STREAM", "PUBSUB"),
            consumer: env_or_default("NATS_CONSUMER", "pubsub"),
            ack_wait: env_millis_or_default("NATS_ACK_WAIT_MS", Duration::from_secs(30))?,
        })
    }
}
