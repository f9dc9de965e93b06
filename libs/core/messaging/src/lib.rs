//! Transport-agnostic publish/subscribe.
//!
//! This library provides one message envelope with an explicit
//! acknowledgment protocol and several transports behind the same
//! [`Publisher`] / [`Subscriber`] traits:
//! - **SQL** (feature `sql`): a table used as a durable queue, polled inside
//!   transactions and acked per consumer group
//! - **HTTP** (feature `http`): one webhook request per message
//! - **NATS** (feature `nats`): JetStream streams with durable pull consumers
//!
//! # Delivery model
//!
//! ```text
//!  storage / broker          worker                    consumer
//!  ┌────────────┐  claim   ┌──────────┐  Message    ┌──────────┐
//!  │  row/msg   │─────────▶│ deliver  │────────────▶│ handler  │
//!  └────────────┘          │  loop    │◀── ack ─────│          │
//!        ▲                 │          │◀── nack ────│          │
//!        │ commit / ack    └──────────┘  (copy +    └──────────┘
//!        └─────────────────────┘          resend)
//! ```
//!
//! Delivery is at-least-once: a message that is not acked before shutdown
//! or cancellation is delivered again later.
//!
//! # Example
//!
//! ```ignore
//! use messaging::{Message, Publisher, Subscriber};
//! use messaging::sql::{SqlPublisher, SqlPublisherConfig, SqlSubscriber, SqlSubscriberConfig};
//!
//! let publisher = SqlPublisher::new(db.clone(), SqlPublisherConfig::postgres())?;
//! publisher.publish("orders", vec![Message::with_new_uuid(b"hello".to_vec())]).await?;
//!
//! let subscriber = SqlSubscriber::new(db, SqlSubscriberConfig::postgres("billing"))?;
//! let mut messages = subscriber.subscribe(CancellationToken::new(), "orders").await?;
//! while let Some(msg) = messages.next().await {
//!     match handle(msg.payload()).await {
//!         Ok(()) => msg.ack(),
//!         Err(_) => msg.nack(),
//!     };
//! }
//! subscriber.close().await;
//! ```

mod delivery;
mod error;
mod message;
mod metrics;
mod naming;
mod pubsub;
mod retry;
mod shutdown;

#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "nats")]
pub mod nats;
#[cfg(feature = "sql")]
pub mod sql;

pub use error::{BoxError, ConfigError, PublishError, SubscribeError};
pub use message::{
    new_uuid, AckState, Message, Metadata, Outcome, HEADER_METADATA, HEADER_UUID,
};
pub use metrics::PubSubMetrics;
pub use naming::{ConstantName, ConsumerName, NamingStrategy, PrefixedName, TopicName};
pub use pubsub::{MessageStream, Publisher, Subscriber};
pub use retry::{retry_with_backoff, RetryConfig, RetryPublisher};

pub use tokio_util::sync::CancellationToken;
