use crate::ProduceArgs;
use eyre::Result;
use messaging::{Message, Metadata, Publisher, RetryConfig, RetryPublisher};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

fn build_messages(payloads: Vec<String>, metadata: &[(String, String)]) -> Vec<Message> {
    let metadata: Metadata = metadata.iter().cloned().collect();
    payloads
        .into_iter()
        .map(|payload| {
            Message::with_metadata(messaging::new_uuid(), payload.into_bytes(), metadata.clone())
        })
        .collect()
}

async fn read_stdin_lines() -> Result<Vec<String>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut payloads = Vec::new();
    while let Some(line) = lines.next_line().await? {
        if !line.is_empty() {
            payloads.push(line);
        }
    }
    Ok(payloads)
}

/// Publish every payload as one message and print the assigned uuids.
///
/// The publisher is closed even when publishing fails.
pub async fn run<P: Publisher + 'static>(publisher: P, args: &ProduceArgs) -> Result<()> {
    let publisher: Box<dyn Publisher> = if args.retries > 0 {
        Box::new(RetryPublisher::new(
            publisher,
            RetryConfig::new().with_max_retries(args.retries),
        ))
    } else {
        Box::new(publisher)
    };

    let payloads = if args.payloads.is_empty() {
        read_stdin_lines().await?
    } else {
        args.payloads.clone()
    };
    let messages = build_messages(payloads, &args.metadata);
    let uuids: Vec<String> = messages.iter().map(|m| m.uuid().to_string()).collect();

    let result = publisher.publish(&args.topic, messages).await;
    publisher.close().await;
    result?;

    for uuid in &uuids {
        println!("{uuid}");
    }
    info!(topic = %args.topic, count = uuids.len(), "Messages published");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use messaging::PublishError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        published: Mutex<Vec<(String, Message)>>,
    }

    #[async_trait::async_trait]
    impl Publisher for &'static Recording {
        async fn publish(&self, topic: &str, messages: Vec<Message>) -> Result<(), PublishError> {
            let mut published = self.published.lock().unwrap();
            published.extend(messages.into_iter().map(|m| (topic.to_string(), m)));
            Ok(())
        }

        async fn close(&self) {}
    }

    fn args(payloads: &[&str]) -> ProduceArgs {
        ProduceArgs {
            topic: "orders".to_string(),
            payloads: payloads.iter().map(|p| p.to_string()).collect(),
            metadata: vec![("trace_id".to_string(), "t-1".to_string())],
            retries: 2,
        }
    }

    #[test]
    fn test_build_messages_shares_metadata() {
        let args = args(&["a", "b"]);
        let messages = build_messages(args.payloads.clone(), &args.metadata);
        assert_eq!(messages.len(), 2);
        assert_ne!(messages[0].uuid(), messages[1].uuid());
        assert_eq!(messages[1].payload(), b"b");
        assert!(
            messages
                .iter()
                .all(|m| m.metadata().get("trace_id") == Some("t-1"))
        );
    }

    #[tokio::test]
    async fn test_run_publishes_in_order() {
        let recording: &'static Recording = Box::leak(Box::default());
        run(recording, &args(&["first", "second"])).await.unwrap();

        let published = recording.published.lock().unwrap();
        let payloads: Vec<&[u8]> = published.iter().map(|(_, m)| m.payload()).collect();
        assert_eq!(payloads, vec![b"first".as_slice(), b"second".as_slice()]);
        assert!(published.iter().all(|(topic, _)| topic == "orders"));
    }
}
