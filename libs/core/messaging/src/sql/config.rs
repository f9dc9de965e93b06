use super::{Acker, Inserter, PostgresSchema, Selecter};
use crate::error::ConfigError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_MESSAGES_TABLE: &str = "messages";
pub const DEFAULT_OFFSETS_TABLE: &str = "offsets_acked";

/// Subscriber configuration, validated once by [`SqlSubscriber::new`](super::SqlSubscriber::new).
#[derive(Clone)]
pub struct SqlSubscriberConfig {
    /// Consumer group sharing acknowledgment state
    pub consumer_group: String,

    /// Sleep between polls when no row is available
    pub poll_interval: Duration,

    /// Delay before a nacked message is delivered again
    pub resend_interval: Duration,

    pub messages_table: String,

    pub offsets_table: String,

    pub acker: Option<Arc<dyn Acker>>,

    pub selecter: Option<Arc<dyn Selecter>>,
}

impl Default for SqlSubscriberConfig {
    fn default() -> Self {
        Self {
            consumer_group: String::new(),
            poll_interval: Duration::from_secs(5),
            resend_interval: Duration::from_secs(1),
            messages_table: DEFAULT_MESSAGES_TABLE.to_string(),
            offsets_table: DEFAULT_OFFSETS_TABLE.to_string(),
            acker: None,
            selecter: None,
        }
    }
}

impl SqlSubscriberConfig {
    /// Defaults with the Postgres dialect for both contracts.
    pub fn postgres(consumer_group: impl Into<String>) -> Self {
        let schema = Arc::new(PostgresSchema);
        Self {
            consumer_group: consumer_group.into(),
            acker: Some(schema.clone()),
            selecter: Some(schema),
            ..Default::default()
        }
    }

    pub fn with_consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = consumer_group.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_resend_interval(mut self, interval: Duration) -> Self {
        self.resend_interval = interval;
        self
    }

    pub fn with_tables(
        mut self,
        messages_table: impl Into<String>,
        offsets_table: impl Into<String>,
    ) -> Self {
        self.messages_table = messages_table.into();
        self.offsets_table = offsets_table.into();
        self
    }

    pub fn with_acker(mut self, acker: Arc<dyn Acker>) -> Self {
        self.acker = Some(acker);
        self
    }

    pub fn with_selecter(mut self, selecter: Arc<dyn Selecter>) -> Self {
        self.selecter = Some(selecter);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::NonPositivePollInterval);
        }
        if self.resend_interval.is_zero() {
            return Err(ConfigError::NonPositiveResendInterval);
        }
        if self.acker.is_none() {
            return Err(ConfigError::MissingAcker);
        }
        if self.selecter.is_none() {
            return Err(ConfigError::MissingSelecter);
        }
        Ok(())
    }
}

impl fmt::Debug for SqlSubscriberConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlSubscriberConfig")
            .field("consumer_group", &self.consumer_group)
            .field("poll_interval", &self.poll_interval)
            .field("resend_interval", &self.resend_interval)
            .field("messages_table", &self.messages_table)
            .field("offsets_table", &self.offsets_table)
            .field("acker", &self.acker.is_some())
            .field("selecter", &self.selecter.is_some())
            .finish()
    }
}

#[derive(Clone)]
pub struct SqlPublisherConfig {
    pub messages_table: String,

    pub inserter: Option<Arc<dyn Inserter>>,
}

impl Default for SqlPublisherConfig {
    fn default() -> Self {
        Self {
            messages_table: DEFAULT_MESSAGES_TABLE.to_string(),
            inserter: None,
        }
    }
}

impl SqlPublisherConfig {
    pub fn postgres() -> Self {
        Self {
            inserter: Some(Arc::new(PostgresSchema)),
            ..Default::default()
        }
    }

    pub fn with_messages_table(mut self, messages_table: impl Into<String>) -> Self {
        self.messages_table = messages_table.into();
        self
    }

    pub fn with_inserter(mut self, inserter: Arc<dyn Inserter>) -> Self {
        self.inserter = Some(inserter);
        self
    }
}

impl fmt::Debug for SqlPublisherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlPublisherConfig")
            .field("messages_table", &self.messages_table)
            .field("inserter", &self.inserter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SqlSubscriberConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.resend_interval, Duration::from_secs(1));
        assert_eq!(config.messages_table, "messages");
        assert_eq!(config.offsets_table, "offsets_acked");
        assert!(config.acker.is_none());
        assert!(config.selecter.is_none());
    }

    #[test]
    fn test_postgres_config_is_valid() {
        assert!(SqlSubscriberConfig::postgres("group").validate().is_ok());
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let err = SqlSubscriberConfig::postgres("group")
            .with_poll_interval(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert_eq!(err, ConfigError::NonPositivePollInterval);
        assert_eq!(err.to_string(), "poll interval must be a positive duration");
    }

    #[test]
    fn test_zero_resend_interval_rejected() {
        let err = SqlSubscriberConfig::postgres("group")
            .with_resend_interval(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert_eq!(err, ConfigError::NonPositiveResendInterval);
    }

    #[test]
    fn test_missing_acker_rejected() {
        let config = SqlSubscriberConfig {
            consumer_group: "group".into(),
            selecter: Some(Arc::new(PostgresSchema)),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "acker is nil");
    }

    #[test]
    fn test_missing_selecter_rejected() {
        let config = SqlSubscriberConfig::default()
            .with_consumer_group("group")
            .with_acker(Arc::new(PostgresSchema));
        assert_eq!(config.validate().unwrap_err(), ConfigError::MissingSelecter);
    }
}
