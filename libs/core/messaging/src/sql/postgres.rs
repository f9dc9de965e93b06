//! PostgreSQL dialect for the SQL binding.
//!
//! Rows are claimed with `FOR UPDATE SKIP LOCKED`, so concurrent workers of
//! the same consumer group never hold the same message.

use super::{Acker, Inserter, SchemaInitializer, Selecter, SqlError};
use crate::message::{Message, Metadata};
use sea_orm::{FromQueryResult, QueryResult, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresSchema;

#[derive(Debug, FromQueryResult)]
struct MessageRow {
    offset: i64,
    uuid: String,
    payload: Vec<u8>,
    metadata: serde_json::Value,
}

/// Quote a possibly schema-qualified identifier.
fn quote_ident(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl Selecter for PostgresSchema {
    fn select_query(
        &self,
        messages_table: &str,
        offsets_table: &str,
        consumer_group: &str,
    ) -> String {
        format!(
            r#"SELECT m."offset", m.uuid, m.payload, m.metadata
FROM {messages} m
WHERE m.topic = $1
  AND NOT EXISTS (
    SELECT 1 FROM {offsets} a
    WHERE a.consumer_group = {group} AND a."offset" = m."offset"
  )
ORDER BY m."offset" ASC
LIMIT 1
FOR UPDATE SKIP LOCKED"#,
            messages = quote_ident(messages_table),
            offsets = quote_ident(offsets_table),
            group = quote_literal(consumer_group),
        )
    }

    fn select_args(&self, topic: &str) -> Vec<Value> {
        vec![topic.into()]
    }

    fn unmarshal_message(&self, row: Option<&QueryResult>) -> Result<(i64, Message), SqlError> {
        let row = row.ok_or(SqlError::NoRows)?;
        let row = MessageRow::from_query_result(row, "")?;
        let metadata: Metadata = serde_json::from_value(row.metadata)?;

        Ok((
            row.offset,
            Message::with_metadata(row.uuid, row.payload, metadata),
        ))
    }
}

impl Acker for PostgresSchema {
    fn ack_query(&self, offsets_table: &str, consumer_group: &str) -> String {
        format!(
            r#"INSERT INTO {offsets} (consumer_group, "offset") VALUES ({group}, $1)"#,
            offsets = quote_ident(offsets_table),
            group = quote_literal(consumer_group),
        )
    }

    fn ack_args(&self, offset: i64) -> Vec<Value> {
        vec![offset.into()]
    }
}

impl Inserter for PostgresSchema {
    fn insert_query(&self, messages_table: &str) -> String {
        format!(
            "INSERT INTO {} (uuid, topic, payload, metadata) VALUES ($1, $2, $3, $4)",
            quote_ident(messages_table)
        )
    }

    fn insert_args(&self, topic: &str, msg: &Message) -> Result<Vec<Value>, SqlError> {
        let metadata = serde_json::to_value(msg.metadata())?;
        Ok(vec![
            msg.uuid().into(),
            topic.into(),
            msg.payload().to_vec().into(),
            metadata.into(),
        ])
    }
}

impl SchemaInitializer for PostgresSchema {
    fn schema_queries(&self, messages_table: &str, offsets_table: &str) -> Vec<String> {
        let index_name = format!("{}_topic_offset_idx", messages_table.replace('.', "_"));
        vec![
            format!(
                r#"CREATE TABLE IF NOT EXISTS {} (
    "offset" BIGSERIAL PRIMARY KEY,
    uuid VARCHAR(36) NOT NULL,
    topic VARCHAR(255) NOT NULL,
    payload BYTEA NOT NULL,
    metadata JSONB NOT NULL DEFAULT '{{}}'::jsonb,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#,
                quote_ident(messages_table)
            ),
            format!(
                r#"CREATE INDEX IF NOT EXISTS {} ON {} (topic, "offset")"#,
                quote_ident(&index_name),
                quote_ident(messages_table)
            ),
            format!(
                r#"CREATE TABLE IF NOT EXISTS {} (
    consumer_group VARCHAR(255) NOT NULL,
    "offset" BIGINT NOT NULL,
    acked_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (consumer_group, "offset")
)"#,
                quote_ident(offsets_table)
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_handles_schema_and_quotes() {
        assert_eq!(quote_ident("messages"), "\"messages\"");
        assert_eq!(quote_ident("queue.messages"), "\"queue\".\"messages\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_select_query_bakes_in_consumer_group() {
        let query = PostgresSchema.select_query("messages", "offsets_acked", "billing's");
        assert!(query.contains("FROM \"messages\" m"));
        assert!(query.contains("FROM \"offsets_acked\" a"));
        assert!(query.contains("a.consumer_group = 'billing''s'"));
        assert!(query.contains("FOR UPDATE SKIP LOCKED"));
        assert!(query.contains("m.topic = $1"));
    }

    #[test]
    fn test_ack_query_uses_single_bind_parameter() {
        let query = PostgresSchema.ack_query("offsets_acked", "billing");
        assert_eq!(
            query,
            r#"INSERT INTO "offsets_acked" (consumer_group, "offset") VALUES ('billing', $1)"#
        );
        assert_eq!(PostgresSchema.ack_args(42).len(), 1);
    }

    #[test]
    fn test_unmarshal_without_row_is_no_rows() {
        let err = PostgresSchema.unmarshal_message(None).unwrap_err();
        assert!(matches!(err, SqlError::NoRows));
    }

    #[test]
    fn test_insert_args_order() {
        let mut msg = Message::new("uuid-1", b"body".to_vec());
        msg.metadata_mut().set("k", "v");
        let args = PostgresSchema.insert_args("orders", &msg).unwrap();
        assert_eq!(args.len(), 4);
        assert_eq!(args[0], Value::from("uuid-1"));
        assert_eq!(args[1], Value::from("orders"));
    }

    #[test]
    fn test_schema_queries() {
        let queries = PostgresSchema.schema_queries("public.messages", "offsets_acked");
        assert_eq!(queries.len(), 3);
        assert!(queries[0].contains("CREATE TABLE IF NOT EXISTS \"public\".\"messages\""));
        assert!(queries[0].contains("'{}'::jsonb"));
        assert!(queries[1].contains("\"public_messages_topic_offset_idx\""));
        assert!(queries[2].contains("PRIMARY KEY (consumer_group, \"offset\")"));
    }
}
