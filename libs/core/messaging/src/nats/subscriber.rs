use super::{decode_message, NatsConfig};
use crate::delivery::{deliver, Delivery};
use crate::error::SubscribeError;
use crate::message::Message;
use crate::metrics::PubSubMetrics;
use crate::pubsub::{message_stream, MessageStream, Subscriber};
use crate::shutdown::Shutdown;
use async_nats::jetstream::consumer::pull::Config as ConsumerConfig;
use async_nats::jetstream::consumer::{AckPolicy, Consumer};
use async_nats::jetstream::{AckKind, Context};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Subscriber pulling from a durable JetStream consumer.
///
/// Acked deliveries are acked on the broker; deliveries abandoned by
/// shutdown or cancellation are nak'ed for redelivery.
#[derive(Clone)]
pub struct NatsSubscriber {
    inner: Arc<Inner>,
}

struct Inner {
    jetstream: Context,
    config: NatsConfig,
    shutdown: Shutdown,
}

impl NatsSubscriber {
    pub fn new(jetstream: Context, config: NatsConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                jetstream,
                config,
                shutdown: Shutdown::new(),
            }),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_closed()
    }
}

#[async_trait]
impl Subscriber for NatsSubscriber {
    async fn subscribe(
        &self,
        ctx: CancellationToken,
        topic: &str,
    ) -> Result<MessageStream, SubscribeError> {
        if self.inner.shutdown.is_closed() {
            return Err(SubscribeError::SubscriberClosed);
        }

        let consumer = self.inner.ensure_consumer(topic).await?;
        let (out, rx) = mpsc::channel(1);
        let inner = self.inner.clone();
        let topic = topic.to_string();
        let span = info_span!("nats_subscription", topic = %topic);

        let spawned = self
            .inner
            .shutdown
            .spawn(async move { inner.consume(consumer, topic, ctx, out).await }.instrument(span));
        if !spawned {
            return Err(SubscribeError::SubscriberClosed);
        }

        Ok(message_stream(rx))
    }

    async fn close(&self) {
        if self.inner.shutdown.close().await {
            info!("NATS subscriber closed");
        }
    }
}

/// An existing durable consumer must filter the subject the topic maps to,
/// otherwise it would silently deliver another topic's messages.
fn check_filter_subject(durable: &str, existing: &str, wanted: &str) -> Result<(), SubscribeError> {
    if existing == wanted {
        return Ok(());
    }
    warn!(
        consumer = %durable,
        existing = %existing,
        wanted = %wanted,
        "Consumer filters another subject"
    );
    Err(SubscribeError::transport(format!(
        "consumer {durable} filters subject {existing:?}, not {wanted:?}; \
         use a consumer naming strategy that gives each topic its own consumer"
    )))
}

impl Inner {
    /// Look up the durable consumer for `topic`, creating it if missing.
    ///
    /// Fails when an existing consumer of that name filters another subject.
    async fn ensure_consumer(&self, topic: &str) -> Result<Consumer<ConsumerConfig>, SubscribeError> {
        let stream_name = self.config.stream.name_for(topic);
        let durable = self.config.consumer.name_for(topic);
        let subject = self.config.subject.name_for(topic);

        let stream = self
            .jetstream
            .get_stream(&stream_name)
            .await
            .map_err(SubscribeError::transport)?;

        match stream.get_consumer::<ConsumerConfig>(&durable).await {
            Ok(consumer) => {
                debug!(stream = %stream_name, consumer = %durable, "Consumer already exists");
                let existing = &consumer.cached_info().config.filter_subject;
                check_filter_subject(&durable, existing, &subject)?;
                Ok(consumer)
            }
            Err(_) => {
                info!(
                    stream = %stream_name,
                    consumer = %durable,
                    subject = %subject,
                    "Creating consumer"
                );
                stream
                    .create_consumer(ConsumerConfig {
                        durable_name: Some(durable.clone()),
                        name: Some(durable),
                        ack_policy: AckPolicy::Explicit,
                        ack_wait: self.config.ack_wait,
                        filter_subject: subject,
                        ..Default::default()
                    })
                    .await
                    .map_err(SubscribeError::transport)
            }
        }
    }

    async fn consume(
        &self,
        consumer: Consumer<ConsumerConfig>,
        topic: String,
        ctx: CancellationToken,
        out: mpsc::Sender<Message>,
    ) {
        let shutdown = self.shutdown.token();
        let metrics = PubSubMetrics::new("nats", &topic);

        let mut messages = match consumer.messages().await {
            Ok(messages) => messages,
            Err(e) => {
                error!(error = %e, "Failed to start pulling messages");
                return;
            }
        };
        info!("Starting consuming");

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ctx.cancelled() => break,
                next = messages.next() => next,
            };

            let incoming = match next {
                Some(Ok(incoming)) => incoming,
                Some(Err(e)) => {
                    error!(error = %e, "Error pulling message");
                    metrics.poll_error();
                    continue;
                }
                None => break,
            };

            let msg = match decode_message(&incoming.payload, incoming.headers.as_ref()) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!(error = %e, "Undecodable message, terminating redelivery");
                    if let Err(e) = incoming.ack_with(AckKind::Term).await {
                        error!(error = %e, "Failed to terminate message");
                    }
                    continue;
                }
            };
            let msg_uuid = msg.uuid().to_string();

            match deliver(
                msg,
                &out,
                &shutdown,
                &ctx,
                self.config.resend_interval,
                &metrics,
            )
            .await
            {
                Delivery::Acked => match incoming.ack().await {
                    Ok(()) => metrics.message_acked(),
                    Err(e) => error!(msg_uuid = %msg_uuid, error = %e, "Failed to ack message"),
                },
                Delivery::Abandoned => {
                    metrics.message_abandoned();
                    if let Err(e) = incoming.ack_with(AckKind::Nak(None)).await {
                        error!(msg_uuid = %msg_uuid, error = %e, "Failed to nak message");
                    }
                }
            }

            if out.is_closed() {
                break;
            }
        }

        info!("Stopped consuming");
    }
}
