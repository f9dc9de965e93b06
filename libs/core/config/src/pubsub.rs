use crate::{env_millis_or_default, env_or_default, env_required, ConfigError, FromEnv};
use std::time::Duration;

/// Settings for the SQL-backed pub/sub binding
///
/// Environment variables:
/// - `DATABASE_URL` (required)
/// - `PUBSUB_MESSAGES_TABLE` (default: `messages`)
/// - `PUBSUB_OFFSETS_TABLE` (default: `offsets_acked`)
/// - `PUBSUB_CONSUMER_GROUP` (default: empty)
/// - `PUBSUB_POLL_INTERVAL_MS` (default: 5000)
/// - `PUBSUB_RESEND_INTERVAL_MS` (default: 1000)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PubSubConfig {
    pub database_url: String,
    pub messages_table: String,
    pub offsets_table: String,
    pub consumer_group: String,
    pub poll_interval: Duration,
    pub resend_interval: Duration,
}

impl FromEnv for PubSubConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: env_required("DATABASE_URL")?,
            messages_table: env_or_default("PUBSUB_MESSAGES_TABLE", "messages"),
            offsets_table: env_or_default("PUBSUB_OFFSETS_TABLE", "offsets_acked"),
            consumer_group: env_or_default("PUBSUB_CONSUMER_GROUP", ""),
            poll_interval: env_millis_or_default(
                "PUBSUB_POLL_INTERVAL_MS",
                Duration::from_secs(5),
            )?,
            resend_interval: env_millis_or_default(
                "PUBSUB_RESEND_INTERVAL_MS",
                Duration::from_secs(1),
            )?,
        })
    }
}
