//! Naming strategies mapping a topic to transport-side names
//! (streams, subjects, durable consumers).

use std::fmt;

pub trait NamingStrategy: Send + Sync + fmt::Debug {
    fn name_for(&self, topic: &str) -> String;
}

/// Same name for every topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantName(pub String);

impl ConstantName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl NamingStrategy for ConstantName {
    fn name_for(&self, _topic: &str) -> String {
        self.0.clone()
    }
}

/// The topic itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopicName;

impl NamingStrategy for TopicName {
    fn name_for(&self, topic: &str) -> String {
        topic.to_string()
    }
}

/// `{prefix}{separator}{topic}`, e.g. `orders.created` for prefix `orders`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixedName {
    prefix: String,
    separator: String,
}

impl PrefixedName {
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            separator: separator.into(),
        }
    }
}

impl NamingStrategy for PrefixedName {
    fn name_for(&self, topic: &str) -> String {
        format!("{}{}{}", self.prefix, self.separator, topic)
    }
}

/// `{prefix}-{topic}` with characters JetStream rejects in consumer names
/// (`.`, `*`, `>`, path separators and whitespace) replaced by `_`.
///
/// Gives every topic its own durable consumer, so one consumer is never
/// asked to filter two subjects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerName {
    prefix: String,
}

impl ConsumerName {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl NamingStrategy for ConsumerName {
    fn name_for(&self, topic: &str) -> String {
        let topic: String = topic
            .chars()
            .map(|c| match c {
                '.' | '*' | '>' | '/' | '\\' => '_',
                c if c.is_whitespace() => '_',
                c => c,
            })
            .collect();
        format!("{}-{}", self.prefix, topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_name_ignores_topic() {
        let naming = ConstantName::new("events");
        assert_eq!(naming.name_for("a"), "events");
        assert_eq!(naming.name_for("b"), "events");
    }

    #[test]
    fn test_topic_name() {
        assert_eq!(TopicName.name_for("orders.created"), "orders.created");
    }

    #[test]
    fn test_prefixed_name() {
        let naming = PrefixedName::new("svc", "_");
        assert_eq!(naming.name_for("orders"), "svc_orders");
    }

    #[test]
    fn test_consumer_name_is_distinct_per_topic() {
        let naming = ConsumerName::new("billing");
        assert_eq!(naming.name_for("orders.created"), "billing-orders_created");
        assert_eq!(naming.name_for("orders.cancelled"), "billing-orders_cancelled");
        assert_ne!(
            naming.name_for("orders.created"),
            naming.name_for("orders.cancelled")
        );
    }

    #[test]
    fn test_consumer_name_replaces_reserved_characters() {
        let naming = ConsumerName::new("svc");
        assert_eq!(naming.name_for("a.*.>"), "svc-a___");
        assert_eq!(naming.name_for("a b/c\\d"), "svc-a_b_c_d");
    }
}
