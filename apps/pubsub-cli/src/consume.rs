use crate::ConsumeArgs;
use eyre::Result;
use futures::StreamExt;
use messaging::{CancellationToken, Message, Metadata, Subscriber};
use serde::Serialize;
use tracing::info;

/// One consumed message as printed to stdout.
#[derive(Debug, Serialize)]
struct Received<'a> {
    uuid: &'a str,
    metadata: &'a Metadata,
    payload: String,
}

impl<'a> From<&'a Message> for Received<'a> {
    fn from(msg: &'a Message) -> Self {
        Self {
            uuid: msg.uuid(),
            metadata: msg.metadata(),
            payload: String::from_utf8_lossy(msg.payload()).into_owned(),
        }
    }
}

/// Print and ack messages until Ctrl-C, the limit, or the end of the stream.
pub async fn run(subscriber: impl Subscriber, args: &ConsumeArgs) -> Result<()> {
    let mut messages = subscriber
        .subscribe(CancellationToken::new(), &args.topic)
        .await?;
    info!(topic = %args.topic, "Consuming");

    let mut acked = 0usize;
    loop {
        let msg = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            msg = messages.next() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        println!("{}", serde_json::to_string(&Received::from(&msg))?);
        msg.ack();
        acked += 1;

        if args.limit.is_some_and(|limit| acked >= limit) {
            break;
        }
    }

    subscriber.close().await;
    info!(acked, "Subscriber closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_received_json_shape() {
        let mut msg = Message::new("uuid-1", b"hello".to_vec());
        msg.metadata_mut().set("trace_id", "t-1");

        let json = serde_json::to_value(Received::from(&msg)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "uuid": "uuid-1",
                "metadata": {"trace_id": "t-1"},
                "payload": "hello",
            })
        );
    }
}
