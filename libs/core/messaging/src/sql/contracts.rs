//! Dialect contracts translating the polling algorithm into concrete SQL.
//!
//! Query text belongs to the dialect; the subscriber only relies on the
//! argument and row shapes described here.

use super::SqlError;
use crate::message::Message;
use sea_orm::{QueryResult, Value};

/// Selects the next unacknowledged row of a topic and decodes it.
pub trait Selecter: Send + Sync {
    /// Query returning at most one candidate row. The consumer group is
    /// baked into the text; the topic is bound through [`select_args`](Self::select_args).
    fn select_query(&self, messages_table: &str, offsets_table: &str, consumer_group: &str)
        -> String;

    fn select_args(&self, topic: &str) -> Vec<Value>;

    /// Decode the selected row into `(offset, message)`.
    ///
    /// Must return [`SqlError::NoRows`] when `row` is `None`.
    fn unmarshal_message(&self, row: Option<&QueryResult>) -> Result<(i64, Message), SqlError>;
}

/// Records an offset as acknowledged for the baked-in consumer group.
#[cfg_attr(test, mockall::automock)]
pub trait Acker: Send + Sync {
    fn ack_query(&self, offsets_table: &str, consumer_group: &str) -> String;

    fn ack_args(&self, offset: i64) -> Vec<Value>;
}

/// Appends messages to the messages table.
pub trait Inserter: Send + Sync {
    fn insert_query(&self, messages_table: &str) -> String;

    fn insert_args(&self, topic: &str, msg: &Message) -> Result<Vec<Value>, SqlError>;
}

/// Creates the messages and offsets tables.
pub trait SchemaInitializer: Send + Sync {
    fn schema_queries(&self, messages_table: &str, offsets_table: &str) -> Vec<String>;
}
