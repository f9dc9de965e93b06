//! Hand-off of one message to a consumer, with nack-driven resends.

use crate::message::{Message, Outcome};
use crate::metrics::PubSubMetrics;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Final result of delivering one logical message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Acked,
    /// Shutdown, cancellation or a dropped consumer ended delivery before an ack.
    Abandoned,
}

/// Deliver `msg` on `out` until some attempt is acked.
///
/// Every attempt gets a context derived from `ctx` that is cancelled as soon
/// as the attempt ends. A nack waits `resend_interval` and delivers a fresh
/// copy. If an ack and shutdown are both ready, the ack wins. Dropping the
/// receiving stream while a message is unresolved abandons it.
pub(crate) async fn deliver(
    mut msg: Message,
    out: &mpsc::Sender<Message>,
    shutdown: &CancellationToken,
    ctx: &CancellationToken,
    resend_interval: Duration,
    metrics: &PubSubMetrics,
) -> Delivery {
    loop {
        let attempt = ctx.child_token();
        let attempt_guard = attempt.clone().drop_guard();
        msg.set_context(attempt.clone());

        let sent = tokio::select! {
            biased;
            _ = shutdown.cancelled() => false,
            _ = attempt.cancelled() => false,
            sent = out.send(msg.clone()) => sent.is_ok(),
        };
        if !sent {
            info!(msg_uuid = %msg.uuid(), "Discarding queued message, subscriber closing");
            return Delivery::Abandoned;
        }
        metrics.message_received();

        let outcome = tokio::select! {
            biased;
            outcome = msg.outcome() => Some(outcome),
            _ = shutdown.cancelled() => None,
            _ = attempt.cancelled() => None,
            _ = out.closed() => None,
        };

        match outcome {
            Some(Outcome::Acked) => {
                debug!(msg_uuid = %msg.uuid(), "Message acked");
                return Delivery::Acked;
            }
            Some(Outcome::Nacked) => {
                metrics.message_nacked();
                debug!(
                    msg_uuid = %msg.uuid(),
                    resend_in_ms = resend_interval.as_millis() as u64,
                    "Message nacked, resending"
                );
                drop(attempt_guard);
                msg = msg.copy();

                let resend = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => false,
                    _ = ctx.cancelled() => false,
                    _ = tokio::time::sleep(resend_interval) => true,
                };
                if !resend {
                    info!(msg_uuid = %msg.uuid(), "Dropping nacked message, subscriber closing");
                    return Delivery::Abandoned;
                }
            }
            None => {
                info!(msg_uuid = %msg.uuid(), "Message not acked before shutdown or stream drop");
                return Delivery::Abandoned;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::{timeout, Instant};

    fn metrics() -> PubSubMetrics {
        PubSubMetrics::new("test", "topic")
    }

    fn spawn_delivery(
        msg: Message,
        out: mpsc::Sender<Message>,
        shutdown: CancellationToken,
        ctx: CancellationToken,
        resend_interval: Duration,
    ) -> tokio::task::JoinHandle<Delivery> {
        tokio::spawn(async move {
            deliver(msg, &out, &shutdown, &ctx, resend_interval, &metrics()).await
        })
    }

    #[tokio::test]
    async fn test_ack_completes_delivery() {
        let (tx, mut rx) = mpsc::channel(1);
        let handle = spawn_delivery(
            Message::new("1", b"hello".to_vec()),
            tx,
            CancellationToken::new(),
            CancellationToken::new(),
            Duration::from_millis(10),
        );

        let received = rx.recv().await.unwrap();
        assert_eq!(received.payload(), b"hello");
        received.ack();

        assert_eq!(handle.await.unwrap(), Delivery::Acked);
        assert!(received.context().is_cancelled());
    }

    #[tokio::test]
    async fn test_nack_resends_fresh_copy_after_interval() {
        let (tx, mut rx) = mpsc::channel(1);
        let resend_interval = Duration::from_millis(50);
        let handle = spawn_delivery(
            Message::new("1", b"hello".to_vec()),
            tx,
            CancellationToken::new(),
            CancellationToken::new(),
            resend_interval,
        );

        let first = rx.recv().await.unwrap();
        let nacked_at = Instant::now();
        first.nack();

        let second = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(nacked_at.elapsed() >= resend_interval);
        assert_eq!(second.uuid(), first.uuid());
        assert_eq!(second.payload(), first.payload());
        assert!(second.state() == crate::AckState::Pending);
        assert!(first.context().is_cancelled());
        assert!(!second.context().is_cancelled());

        second.ack();
        assert!(first.is_nacked());
        assert_eq!(handle.await.unwrap(), Delivery::Acked);
    }

    #[tokio::test]
    async fn test_shutdown_while_waiting_for_ack_abandons() {
        let (tx, mut rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        let handle = spawn_delivery(
            Message::new("1", b"hello".to_vec()),
            tx,
            shutdown.clone(),
            CancellationToken::new(),
            Duration::from_millis(10),
        );

        let received = rx.recv().await.unwrap();
        shutdown.cancel();

        assert_eq!(handle.await.unwrap(), Delivery::Abandoned);
        assert!(received.context().is_cancelled());
    }

    #[tokio::test]
    async fn test_caller_cancellation_abandons_pending_send() {
        let (tx, _rx) = mpsc::channel(1);
        // Fill the single slot so the hand-off blocks.
        tx.send(Message::new("filler", Vec::new())).await.unwrap();

        let ctx = CancellationToken::new();
        let handle = spawn_delivery(
            Message::new("1", Vec::new()),
            tx,
            CancellationToken::new(),
            ctx.clone(),
            Duration::from_millis(10),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        ctx.cancel();
        assert_eq!(handle.await.unwrap(), Delivery::Abandoned);
    }

    #[tokio::test]
    async fn test_dropped_consumer_abandons() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let delivery = deliver(
            Message::new("1", Vec::new()),
            &tx,
            &CancellationToken::new(),
            &CancellationToken::new(),
            Duration::from_millis(10),
            &metrics(),
        )
        .await;
        assert_eq!(delivery, Delivery::Abandoned);
    }

    #[tokio::test]
    async fn test_dropped_stream_abandons_unresolved_message() {
        let (tx, mut rx) = mpsc::channel(1);
        let handle = spawn_delivery(
            Message::new("1", b"hello".to_vec()),
            tx,
            CancellationToken::new(),
            CancellationToken::new(),
            Duration::from_millis(10),
        );

        let received = rx.recv().await.unwrap();
        drop(rx);

        let delivery = timeout(Duration::from_secs(1), handle)
            .await
            .expect("delivery must not wait for an ack nobody can send")
            .unwrap();
        assert_eq!(delivery, Delivery::Abandoned);
        assert!(received.context().is_cancelled());
    }

    #[tokio::test]
    async fn test_ack_wins_over_simultaneous_shutdown() {
        let (tx, mut rx) = mpsc::channel::<Message>(1);
        let shutdown = CancellationToken::new();
        let msg = Message::new("1", Vec::new());

        let consumer = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                let received = rx.recv().await.unwrap();
                received.ack();
                shutdown.cancel();
            }
        });

        let delivery = deliver(
            msg,
            &tx,
            &shutdown,
            &CancellationToken::new(),
            Duration::from_millis(10),
            &metrics(),
        )
        .await;
        consumer.await.unwrap();
        assert_eq!(delivery, Delivery::Acked);
    }

    #[tokio::test]
    async fn test_shutdown_during_resend_wait_abandons() {
        let (tx, mut rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        let handle = spawn_delivery(
            Message::new("1", Vec::new()),
            tx,
            shutdown.clone(),
            CancellationToken::new(),
            Duration::from_secs(60),
        );

        rx.recv().await.unwrap().nack();
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.cancel();

        let delivery = timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        assert_eq!(delivery, Delivery::Abandoned);
    }
}
