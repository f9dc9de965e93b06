//! Polling subscriber with transactional acknowledgment.

use super::{Acker, Selecter, SqlError, SqlSubscriberConfig};
use crate::delivery::{deliver, Delivery};
use crate::error::{ConfigError, SubscribeError};
use crate::message::Message;
use crate::metrics::PubSubMetrics;
use crate::pubsub::{message_stream, MessageStream, Subscriber};
use crate::shutdown::Shutdown;
use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, Statement, TransactionTrait,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

/// Subscriber turning a messages table into a durable, at-least-once queue.
///
/// Every subscription runs one worker doing strictly sequential poll
/// cycles, each inside its own transaction:
///
/// 1. select the next row not yet acked by the consumer group
/// 2. hand the message to the consumer, resending copies on nack
/// 3. on ack insert the offset and commit, otherwise roll back
///
/// The transaction stays open while the consumer handles the message.
#[derive(Clone)]
pub struct SqlSubscriber {
    inner: Arc<Inner>,
}

struct Inner {
    db: DatabaseConnection,
    config: SqlSubscriberConfig,
    selecter: Arc<dyn Selecter>,
    acker: Arc<dyn Acker>,
    select_sql: String,
    ack_sql: String,
    shutdown: Shutdown,
}

/// Result of one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cycle {
    Acked,
    Abandoned,
    Idle,
    /// Shutdown or cancellation before any message was claimed.
    Interrupted,
}

impl SqlSubscriber {
    pub fn new(db: DatabaseConnection, config: SqlSubscriberConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let acker = config.acker.clone().ok_or(ConfigError::MissingAcker)?;
        let selecter = config.selecter.clone().ok_or(ConfigError::MissingSelecter)?;

        let select_sql = selecter.select_query(
            &config.messages_table,
            &config.offsets_table,
            &config.consumer_group,
        );
        let ack_sql = acker.ack_query(&config.offsets_table, &config.consumer_group);

        debug!(
            consumer_group = %config.consumer_group,
            select_sql = %select_sql,
            ack_sql = %ack_sql,
            "Prepared subscriber statements"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                db,
                config,
                selecter,
                acker,
                select_sql,
                ack_sql,
                shutdown: Shutdown::new(),
            }),
        })
    }

    pub fn config(&self) -> &SqlSubscriberConfig {
        &self.inner.config
    }

    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_closed()
    }
}

#[async_trait]
impl Subscriber for SqlSubscriber {
    async fn subscribe(
        &self,
        ctx: CancellationToken,
        topic: &str,
    ) -> Result<MessageStream, SubscribeError> {
        if self.inner.shutdown.is_closed() {
            return Err(SubscribeError::SubscriberClosed);
        }

        let (out, rx) = mpsc::channel(1);
        let inner = self.inner.clone();
        let topic = topic.to_string();
        let span = info_span!(
            "sql_subscription",
            topic = %topic,
            consumer_group = %self.inner.config.consumer_group
        );

        let spawned = self
            .inner
            .shutdown
            .spawn(async move { inner.consume(topic, ctx, out).await }.instrument(span));
        if !spawned {
            return Err(SubscribeError::SubscriberClosed);
        }

        Ok(message_stream(rx))
    }

    async fn close(&self) {
        if self.inner.shutdown.close().await {
            info!(
                consumer_group = %self.inner.config.consumer_group,
                "SQL subscriber closed"
            );
        }
    }
}

impl Inner {
    async fn consume(&self, topic: String, ctx: CancellationToken, out: mpsc::Sender<Message>) {
        let shutdown = self.shutdown.token();
        let metrics = PubSubMetrics::new("sql", &topic);
        info!("Starting consuming");

        loop {
            if shutdown.is_cancelled() || ctx.is_cancelled() || out.is_closed() {
                break;
            }

            match self.poll(&topic, &shutdown, &ctx, &out, &metrics).await {
                Ok(Cycle::Acked) => metrics.message_acked(),
                Ok(Cycle::Abandoned) => metrics.message_abandoned(),
                Ok(Cycle::Interrupted) => {}
                Ok(Cycle::Idle) => {
                    trace!("No messages, waiting for next poll");
                    tokio::select! {
                        _ = shutdown.cancelled() => {}
                        _ = ctx.cancelled() => {}
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
                Err(e) => {
                    // Retried without delay.
                    error!(error = %e, "Error querying for message");
                    metrics.poll_error();
                    tokio::task::yield_now().await;
                }
            }
        }

        info!("Stopped consuming");
    }

    /// One transactional poll cycle. Commits only when the message was acked.
    async fn poll(
        &self,
        topic: &str,
        shutdown: &CancellationToken,
        ctx: &CancellationToken,
        out: &mpsc::Sender<Message>,
        metrics: &PubSubMetrics,
    ) -> Result<Cycle, SqlError> {
        let txn = self.db.begin().await?;
        let result = self
            .claim_and_deliver(&txn, topic, shutdown, ctx, out, metrics)
            .await;

        match result {
            Ok(Cycle::Acked) => {
                txn.commit().await?;
                Ok(Cycle::Acked)
            }
            other => {
                if let Err(e) = txn.rollback().await {
                    warn!(error = %e, "Failed to roll back poll transaction");
                }
                other
            }
        }
    }

    async fn claim_and_deliver(
        &self,
        txn: &DatabaseTransaction,
        topic: &str,
        shutdown: &CancellationToken,
        ctx: &CancellationToken,
        out: &mpsc::Sender<Message>,
        metrics: &PubSubMetrics,
    ) -> Result<Cycle, SqlError> {
        let backend = txn.get_database_backend();
        let select = Statement::from_sql_and_values(
            backend,
            self.select_sql.as_str(),
            self.selecter.select_args(topic),
        );

        let row = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(Cycle::Interrupted),
            _ = ctx.cancelled() => return Ok(Cycle::Interrupted),
            row = txn.query_one_raw(select) => row?,
        };

        let (offset, msg) = match self.selecter.unmarshal_message(row.as_ref()) {
            Ok(claimed) => claimed,
            Err(SqlError::NoRows) => return Ok(Cycle::Idle),
            Err(e) => return Err(e),
        };

        debug!(offset, msg_uuid = %msg.uuid(), "Received message");

        let delivery = deliver(
            msg,
            out,
            shutdown,
            ctx,
            self.config.resend_interval,
            metrics,
        )
        .await;
        if delivery == Delivery::Abandoned {
            return Ok(Cycle::Abandoned);
        }

        let ack = Statement::from_sql_and_values(
            backend,
            self.ack_sql.as_str(),
            self.acker.ack_args(offset),
        );
        txn.execute_raw(ack).await?;

        debug!(offset, "Offset acked");
        Ok(Cycle::Acked)
    }
}
