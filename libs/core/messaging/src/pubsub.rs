//! Publisher and subscriber traits implemented by every transport.

use crate::error::{PublishError, SubscribeError};
use crate::message::Message;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

/// Stream of delivered messages. Ends when the subscription worker stops.
pub type MessageStream = BoxStream<'static, Message>;

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish messages to `topic` in order. Fails fast once closed.
    async fn publish(&self, topic: &str, messages: Vec<Message>) -> Result<(), PublishError>;

    /// Idempotent.
    async fn close(&self);
}

#[async_trait]
impl<P: Publisher + ?Sized> Publisher for Box<P> {
    async fn publish(&self, topic: &str, messages: Vec<Message>) -> Result<(), PublishError> {
        (**self).publish(topic, messages).await
    }

    async fn close(&self) {
        (**self).close().await
    }
}

#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Start one worker for `topic` and return the stream it feeds.
    ///
    /// Cancelling `ctx` stops only this subscription; [`close`](Self::close)
    /// stops all of them. Dropping the stream also stops the worker: a
    /// message received but not yet acked is abandoned and its context
    /// cancelled, so the transport redelivers it later.
    async fn subscribe(
        &self,
        ctx: CancellationToken,
        topic: &str,
    ) -> Result<MessageStream, SubscribeError>;

    /// Stop every worker and wait for them to exit. Idempotent.
    async fn close(&self);
}

#[async_trait]
impl<S: Subscriber + ?Sized> Subscriber for Box<S> {
    async fn subscribe(
        &self,
        ctx: CancellationToken,
        topic: &str,
    ) -> Result<MessageStream, SubscribeError> {
        (**self).subscribe(ctx, topic).await
    }

    async fn close(&self) {
        (**self).close().await
    }
}

/// Wrap a worker's hand-off channel into a [`MessageStream`].
///
/// Messages whose attempt already ended while queued are skipped.
pub(crate) fn message_stream(rx: mpsc::Receiver<Message>) -> MessageStream {
    ReceiverStream::new(rx)
        .filter(|msg| futures::future::ready(!msg.context().is_cancelled()))
        .boxed()
}
