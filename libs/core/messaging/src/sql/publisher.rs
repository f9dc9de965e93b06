use super::{Inserter, SqlPublisherConfig};
use crate::error::{ConfigError, PublishError};
use crate::message::Message;
use crate::metrics::PubSubMetrics;
use crate::pubsub::Publisher;
use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement, TransactionTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Appends messages to the messages table, one transaction per publish call.
pub struct SqlPublisher {
    db: DatabaseConnection,
    inserter: Arc<dyn Inserter>,
    insert_sql: String,
    closed: AtomicBool,
}

impl SqlPublisher {
    pub fn new(db: DatabaseConnection, config: SqlPublisherConfig) -> Result<Self, ConfigError> {
        let inserter = config.inserter.ok_or(ConfigError::MissingInserter)?;
        let insert_sql = inserter.insert_query(&config.messages_table);

        Ok(Self {
            db,
            inserter,
            insert_sql,
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl Publisher for SqlPublisher {
    async fn publish(&self, topic: &str, messages: Vec<Message>) -> Result<(), PublishError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PublishError::PublisherClosed);
        }

        let metrics = PubSubMetrics::new("sql", topic);
        let txn = self.db.begin().await.map_err(PublishError::transport)?;
        let backend = txn.get_database_backend();

        for msg in &messages {
            let args = self
                .inserter
                .insert_args(topic, msg)
                .map_err(|e| PublishError::Marshal {
                    uuid: msg.uuid().to_string(),
                    reason: e.to_string(),
                })?;
            let stmt = Statement::from_sql_and_values(backend, self.insert_sql.as_str(), args);

            if let Err(e) = txn.execute_raw(stmt).await {
                metrics.publish_failed();
                return Err(PublishError::transport(e));
            }
            debug!(topic = %topic, msg_uuid = %msg.uuid(), "Message inserted");
        }

        txn.commit().await.map_err(|e| {
            metrics.publish_failed();
            PublishError::transport(e)
        })?;

        for _ in &messages {
            metrics.message_published();
        }
        Ok(())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("SQL publisher closed");
        }
    }
}
