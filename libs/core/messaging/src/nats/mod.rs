//! NATS JetStream binding.
//!
//! Topics map to stream, subject and durable consumer names through
//! [`NamingStrategy`](crate::NamingStrategy) implementations. Streams must
//! already exist; durable pull consumers are created on first subscribe.
//! A delivery that ends without an ack is nak'ed so the broker redelivers it.

mod config;
mod publisher;
mod subscriber;

pub use config::NatsConfig;
pub use publisher::NatsPublisher;
pub use subscriber::NatsSubscriber;

use crate::message::{new_uuid, Message, Metadata};
use crate::{HEADER_METADATA, HEADER_UUID};
use async_nats::HeaderMap;

/// Build the headers carrying a message's uuid and metadata.
fn encode_headers(msg: &Message) -> Result<HeaderMap, serde_json::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(HEADER_UUID, msg.uuid());
    headers.insert(HEADER_METADATA, serde_json::to_string(msg.metadata())?.as_str());
    Ok(headers)
}

/// Rebuild a message from a NATS payload and headers.
///
/// Messages from foreign publishers without a uuid header get a fresh uuid.
fn decode_message(
    payload: &[u8],
    headers: Option<&HeaderMap>,
) -> Result<Message, serde_json::Error> {
    let uuid = headers
        .and_then(|h| h.get(HEADER_UUID))
        .map(|v| v.as_str().to_string())
        .unwrap_or_else(new_uuid);

    let metadata = match headers.and_then(|h| h.get(HEADER_METADATA)) {
        Some(value) => serde_json::from_str(value.as_str())?,
        None => Metadata::new(),
    };

    Ok(Message::with_metadata(uuid, payload.to_vec(), metadata))
}
