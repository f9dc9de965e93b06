//! Relational storage binding: an ordinary table used as a durable queue.
//!
//! Each subscription polls the messages table inside a transaction, hands
//! the row to the consumer and only writes the consumer group's offset (and
//! commits) once the message is acked. Anything else rolls back, so the row
//! stays claimable and delivery is at-least-once.
//!
//! ```rust,ignore
//! use messaging::sql::{SqlSubscriber, SqlSubscriberConfig};
//! use messaging::Subscriber;
//!
//! let subscriber = SqlSubscriber::new(db, SqlSubscriberConfig::postgres("billing"))?;
//! let mut messages = subscriber.subscribe(CancellationToken::new(), "orders").await?;
//! while let Some(msg) = messages.next().await {
//!     handle(&msg).await;
//!     msg.ack();
//! }
//! ```

mod config;
mod contracts;
mod postgres;
mod publisher;
mod subscriber;

pub use config::{SqlPublisherConfig, SqlSubscriberConfig};
pub use contracts::{Acker, Inserter, SchemaInitializer, Selecter};
pub use postgres::PostgresSchema;
pub use publisher::SqlPublisher;
pub use subscriber::SqlSubscriber;

use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SqlError {
    /// No candidate row; the normal idle state of a poll.
    #[error("no rows")]
    NoRows,

    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error("invalid message metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Create the messages and offsets tables if they do not exist.
pub async fn initialize_schema(
    db: &DatabaseConnection,
    schema: &dyn SchemaInitializer,
    messages_table: &str,
    offsets_table: &str,
) -> Result<(), SqlError> {
    for query in schema.schema_queries(messages_table, offsets_table) {
        db.execute_unprepared(&query).await?;
    }
    info!(
        messages_table = %messages_table,
        offsets_table = %offsets_table,
        "Message tables initialized"
    );
    Ok(())
}
